//! Dataset indexing, splitting, and Burn-compatible batching for the
//! food-localization harness.
//!
//! Batches are `(images, optional targets)` pairs: CHW float tensors plus one
//! normalized box per image. The iterators are finite and restartable, and
//! expose batch counts for progress math.

pub mod batch;
pub mod labels;
pub mod splits;
pub mod types;

pub use batch::{BatchIter, LocalizerBatch};
pub use labels::{read_label_file, write_label_file};
pub use splits::{index_test_split, load_with_split, test_images, test_labels, SplitLoaders};
pub use types::{DataProfile, DatasetError, DatasetResult, LoaderConfig, SampleIndex};
