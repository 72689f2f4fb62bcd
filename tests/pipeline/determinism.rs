use cmap::storage::{ArtifactStore, SqliteArtifactStore};
use cmap::test_utils::fixtures::analyst_inputs;

use super::fixture::PipelineFixture;

#[test]
fn identical_inputs_yield_identical_artifacts() {
    let fixture = PipelineFixture::new("identical_inputs_yield_identical_artifacts");
    let (_, first) = fixture.run_in_memory("run-same", &analyst_inputs());
    let (_, second) = fixture.run_in_memory("run-same", &analyst_inputs());
    let first = serde_json::to_string(&first.unwrap().artifacts).unwrap();
    let second = serde_json::to_string(&second.unwrap().artifacts).unwrap();
    assert_eq!(first, second);
    fixture.logger.pass();
}

#[test]
fn memory_and_sqlite_stores_agree() {
    let fixture = PipelineFixture::new("memory_and_sqlite_stores_agree");
    let (memory, _) = fixture.run_in_memory("run-both", &analyst_inputs());
    let sqlite = SqliteArtifactStore::open_in_memory().unwrap();
    fixture.run(&sqlite, "run-both", &analyst_inputs()).unwrap();

    let from_memory = memory.load("run-both").unwrap();
    let from_sqlite = sqlite.load("run-both").unwrap();
    assert_eq!(from_memory.artifacts, from_sqlite.artifacts);
    assert_eq!(from_memory.skipped, from_sqlite.skipped);
    assert_eq!(from_memory.summary.status, from_sqlite.summary.status);
    fixture.logger.pass();
}

#[test]
fn ranking_is_stable_across_runs() {
    let fixture = PipelineFixture::new("ranking_is_stable_across_runs");
    let ids: Vec<Vec<String>> = (0..3)
        .map(|i| {
            let (_, state) = fixture.run_in_memory(&format!("run-{i}"), &analyst_inputs());
            let ranking = state.unwrap().ranking.unwrap();
            ranking.ranked.ids().into_iter().map(String::from).collect()
        })
        .collect();
    assert_eq!(ids[0], ids[1]);
    assert_eq!(ids[1], ids[2]);
    fixture.logger.pass();
}
