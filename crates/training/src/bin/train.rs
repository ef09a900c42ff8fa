use clap::Parser;
use training::{run_infer, run_train, RunMode, TrainArgs};

fn main() -> anyhow::Result<()> {
    let args = TrainArgs::parse();
    match args.mode {
        RunMode::Train => {
            run_train(args)?;
        }
        RunMode::Infer => {
            run_infer(args)?;
        }
    }
    Ok(())
}
