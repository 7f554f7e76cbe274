//! 속성 테스트 -- 커서 단조성과 유실 없는 재개

use std::io::Write;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use alertrelay_core::types::{CheckpointKey, Cursor};
use alertrelay_shipper::CheckpointStore;
use alertrelay_shipper::source::http::order_batch;
use alertrelay_shipper::source::{FileTail, RawRecord, RecordPayload};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// 더 읽을 줄이 없을 때까지 tail에서 줄을 꺼냅니다.
async fn drain(tail: &mut FileTail, limit: usize) -> Vec<RawRecord> {
    let cancel = CancellationToken::new();
    let mut out = Vec::new();
    while out.len() < limit {
        match tokio::time::timeout(Duration::from_millis(100), tail.next_line(&cancel)).await {
            Ok(Ok(Some(record))) => out.push(record),
            _ => break,
        }
    }
    out
}

fn text(record: &RawRecord) -> String {
    match &record.payload {
        RecordPayload::Line(line) => line.clone(),
        RecordPayload::Entry(entry) => entry.to_string(),
    }
}

fn id_of(record: &RawRecord) -> u64 {
    match &record.payload {
        RecordPayload::Entry(entry) => entry["id"].as_u64().unwrap(),
        RecordPayload::Line(_) => panic!("expected entry"),
    }
}

fn line_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9 {}:\",]{0,40}", 1..25)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// 어느 시점에 멈추든, 재시작 후 체크포인트 이후의 모든 줄을 순서대로 다시 읽습니다.
    #[test]
    fn resume_never_loses_lines(
        lines in line_strategy(),
        processed_frac in 0.0f64..=1.0,
        checkpoint_lag in 0usize..3,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("eve.json");
        let mut file = std::fs::File::create(&log).unwrap();
        for line in &lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();

        let key = CheckpointKey::new("suricata", "eth0");
        let store = CheckpointStore::new(dir.path().join("checkpoints.json"), vec![key.clone()]);

        let processed = ((lines.len() as f64) * processed_frac) as usize;
        let checkpointed = processed.saturating_sub(checkpoint_lag);

        let rt = runtime();
        let (before, after) = rt.block_on(async {
            // 첫 실행: processed 줄을 처리했지만 checkpointed 줄까지만 저장하고 크래시
            let mut tail = FileTail::open(&log, store.ensure_key(&key).unwrap())
                .await
                .unwrap()
                .with_backoff(Duration::from_millis(1));
            let before = drain(&mut tail, processed).await;
            if checkpointed > 0 {
                store.advance(&key, before[checkpointed - 1].cursor).unwrap();
            }
            drop(tail);

            // 재시작: 저장된 커서부터 끝까지
            let start = store.ensure_key(&key).unwrap();
            let mut tail = FileTail::open(&log, start)
                .await
                .unwrap()
                .with_backoff(Duration::from_millis(1));
            let after = drain(&mut tail, usize::MAX).await;
            (before, after)
        });

        prop_assert_eq!(before.len(), processed);
        let resumed: Vec<String> = after.iter().map(text).collect();
        prop_assert_eq!(&resumed[..], &lines[checkpointed..]);
    }

    /// 한 실행 안에서 저장되는 커서는 감소하지 않습니다.
    #[test]
    fn file_cursor_is_monotonic(chunks in prop::collection::vec(line_strategy(), 1..4)) {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("eve.json");
        std::fs::File::create(&log).unwrap();

        let key = CheckpointKey::new("suricata", "eth0");
        let store = CheckpointStore::new(dir.path().join("checkpoints.json"), vec![key.clone()]);

        let rt = runtime();
        let saved = rt.block_on(async {
            let mut tail = FileTail::open(&log, store.ensure_key(&key).unwrap())
                .await
                .unwrap()
                .with_backoff(Duration::from_millis(1));
            let mut saved = Vec::new();
            for chunk in &chunks {
                let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
                for line in chunk {
                    writeln!(file, "{line}").unwrap();
                }
                file.flush().unwrap();

                for record in drain(&mut tail, chunk.len()).await {
                    store.advance(&key, record.cursor).unwrap();
                    saved.push(store.load().unwrap().get(&key).unwrap());
                }
            }
            saved
        });

        let total: usize = chunks.iter().map(Vec::len).sum();
        prop_assert_eq!(saved.len(), total);
        prop_assert!(saved.windows(2).all(|w| w[0] <= w[1]));
    }

    /// 정렬된 배치의 커서는 감소하지 않고 시작 커서 이상이며, 마지막 커서는 최대 seqno입니다.
    #[test]
    fn http_batch_cursor_is_monotonic(
        seqnos in prop::collection::vec(0u64..1000, 0..50),
        after in 0u64..500,
    ) {
        let entries = seqnos.iter().map(|s| json!({"seqno": s.to_string()})).collect();
        let batch = order_batch(entries, Cursor(after));

        prop_assert!(batch.windows(2).all(|w| w[0].cursor <= w[1].cursor));
        prop_assert!(batch.iter().all(|r| r.cursor.get() >= after));
        prop_assert_eq!(batch.len(), seqnos.iter().filter(|s| **s > after).count());
        if let Some(last) = batch.last() {
            prop_assert_eq!(Some(last.cursor.get()), seqnos.iter().copied().filter(|s| *s > after).max());
        }
    }

    /// 배치의 어느 항목 뒤에서 멈추든, 저장된 커서로 다시 조회하면 남은 항목을 모두 받습니다.
    #[test]
    fn http_resume_after_any_item_loses_nothing(
        seqnos in prop::collection::vec(1u64..20, 1..30),
        stop_frac in 0.0f64..=1.0,
    ) {
        let remote: Vec<serde_json::Value> = seqnos
            .iter()
            .enumerate()
            .map(|(id, s)| json!({"seqno": s, "id": id}))
            .collect();
        let batch = order_batch(remote.clone(), Cursor::START);
        let stop = ((batch.len() as f64) * stop_frac) as usize;

        let saved = if stop == 0 { Cursor::START } else { batch[stop - 1].cursor };
        let resumed = order_batch(remote, saved);

        let mut delivered: Vec<u64> = batch[..stop]
            .iter()
            .chain(resumed.iter())
            .map(id_of)
            .collect();
        delivered.sort_unstable();
        delivered.dedup();
        prop_assert_eq!(delivered, (0..seqnos.len() as u64).collect::<Vec<_>>());
    }
}
