//! CSV and JSON export of batch results.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use photo_cull_adapters::export::{render_csv, render_json, CSV_HEADER};
use photo_cull_adapters::{CsvOutput, JsonOutput};
use photo_cull_core::{
    AiScore, BatchResults, BatchState, BatchSummary, CompositionScore, Group, ItemId,
    ResultOutput, ScoreResult, TechnicalScore,
};

/// Writer that keeps everything in a shared buffer.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn scored(id: &str, overall: f32, passed: bool, ai: bool) -> ScoreResult {
    let mut result = ScoreResult::failed(ItemId::new(id), "");
    result.error = None;
    result.technical = Some(TechnicalScore {
        blur: 1.0,
        exposure: 1.0,
        saturation: 1.0,
        contrast: 1.0,
        overall: 0.9,
    });
    result.composition = Some(CompositionScore { overall: 0.5 });
    if ai {
        result.ai = Some(AiScore {
            aesthetic: 0.7,
            technical: 0.6,
            overall: 0.65,
        });
    }
    result.overall = overall;
    result.passed = passed;
    result
}

fn batch() -> BatchResults {
    let mut best = scored("IMG_0001.jpg", 0.8, true, true);
    best.group_id = Some("group-1".into());
    best.is_group_best = true;
    let mut second = scored("IMG_0002.jpg", 0.7, true, true);
    second.group_id = Some("group-1".into());
    let mut degraded = scored("day 2, ceremony.jpg", 0.45, false, false);
    degraded.warnings.push("AI assessment unavailable: connection failed".into());

    BatchResults {
        state: BatchState::Completed,
        results: vec![
            best,
            second,
            degraded,
            ScoreResult::invalid(ItemId::new("notes.txt"), "unsupported file format 'TXT'"),
            ScoreResult::failed(ItemId::new("IMG_0009.jpg"), "backend rejected input: bad"),
        ],
        groups: vec![Group {
            id: "group-1".into(),
            members: vec![ItemId::new("IMG_0001.jpg"), ItemId::new("IMG_0002.jpg")],
            best: ItemId::new("IMG_0001.jpg"),
        }],
        summary: BatchSummary {
            total: 5,
            processed: 4,
            passed: 2,
            failed: 3,
            grouped: 2,
            errors: 2,
        },
    }
}

#[test]
fn test_csv_rows_only_for_scored_items() {
    let csv = render_csv(&batch());
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "IMG_0001.jpg,0.800,0.900,0.650,true,group-1");
    assert_eq!(lines[2], "IMG_0002.jpg,0.700,0.900,0.650,true,group-1");
    // Composition stands in for the aesthetic column without an AI score.
    assert_eq!(lines[3], "\"day 2, ceremony.jpg\",0.450,0.900,0.500,false,");
    assert!(!csv.contains("notes.txt"));
    assert!(!csv.contains("IMG_0009"));
}

#[test]
fn test_json_document_shape() {
    let json = render_json(&batch(), false).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["state"], "completed");
    assert_eq!(value["summary"]["total"], 5);
    assert_eq!(value["summary"]["grouped"], 2);

    let photos = value["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 5);
    assert_eq!(photos[0]["id"], "IMG_0001.jpg");
    assert_eq!(photos[0]["scores"]["groupId"], "group-1");
    assert_eq!(photos[0]["scores"]["isGroupBest"], true);
    assert!(photos[0]["timestamp"].is_string());
    assert!(photos[2]["scores"].get("ai").is_none());
    assert_eq!(photos[2]["scores"]["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(photos[3]["scores"]["valid"], false);
    assert_eq!(photos[4]["scores"]["error"], "backend rejected input: bad");

    assert_eq!(value["groups"][0]["best"], "IMG_0001.jpg");
}

#[test]
fn test_outputs_write_to_writer() {
    let buffer = SharedBuffer::default();
    let output = CsvOutput::new(Box::new(buffer.clone()));
    output.write(&batch()).unwrap();
    output.flush().unwrap();
    assert!(buffer.contents().starts_with(CSV_HEADER));

    let buffer = SharedBuffer::default();
    let output = JsonOutput::new(Box::new(buffer.clone()), true);
    output.write(&batch()).unwrap();
    output.flush().unwrap();
    let contents = buffer.contents();
    assert!(contents.contains("\n  \"summary\""));
    assert!(contents.ends_with("}\n"));
}
