//! File-based mean-IoU metric.
//!
//! The evaluation runner hands this function two file paths; rows pair up by
//! position. Keeping the file interface means the metric can be swapped for
//! the platform's own scorer without touching the harness.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use dataset::read_label_file;

/// Mean IoU between a predictions file (four floats per line) and a label
/// file (`name x0 y0 x1 y1` per line). Fails on malformed rows or a count
/// mismatch.
pub fn evaluation_metrics(pred_path: &Path, label_path: &Path) -> anyhow::Result<f32> {
    let preds = read_prediction_file(pred_path)?;
    let labels = read_label_file(label_path)
        .with_context(|| format!("reading labels from {}", label_path.display()))?;
    if preds.len() != labels.len() {
        bail!(
            "prediction/label count mismatch: {} predictions vs {} labels",
            preds.len(),
            labels.len()
        );
    }
    if preds.is_empty() {
        bail!("no rows to score in {}", pred_path.display());
    }

    let total: f32 = preds
        .iter()
        .zip(&labels)
        .map(|(pred, (_, label))| iou_xyxy(*pred, *label))
        .sum();
    Ok(total / preds.len() as f32)
}

pub fn read_prediction_file(path: &Path) -> anyhow::Result<Vec<[f32; 4]>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading predictions from {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            bail!(
                "{}:{}: expected 4 fields, got {}",
                path.display(),
                idx + 1,
                fields.len()
            );
        }
        let mut row = [0.0f32; 4];
        for (slot, field) in row.iter_mut().zip(&fields) {
            *slot = field.parse().with_context(|| {
                format!("{}:{}: invalid coordinate {field:?}", path.display(), idx + 1)
            })?;
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn iou_xyxy(a: [f32; 4], b: [f32; 4]) -> f32 {
    let ax0 = a[0].min(a[2]);
    let ay0 = a[1].min(a[3]);
    let ax1 = a[0].max(a[2]);
    let ay1 = a[1].max(a[3]);
    let bx0 = b[0].min(b[2]);
    let by0 = b[1].min(b[3]);
    let bx1 = b[0].max(b[2]);
    let by1 = b[1].max(b[3]);

    let inter_x0 = ax0.max(bx0);
    let inter_y0 = ay0.max(by0);
    let inter_x1 = ax1.min(bx1);
    let inter_y1 = ay1.min(by1);

    let inter_w = (inter_x1 - inter_x0).max(0.0);
    let inter_h = (inter_y1 - inter_y0).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = (ax1 - ax0).max(0.0) * (ay1 - ay0).max(0.0);
    let area_b = (bx1 - bx0).max(0.0) * (by1 - by0).max(0.0);
    let denom = area_a + area_b - inter_area;
    if denom <= 0.0 {
        0.0
    } else {
        inter_area / denom
    }
}
