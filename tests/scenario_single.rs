mod support;

use mergeplay::strategy::PreMergeStrategy;
use mergeplay::workflow::TaskState;
use support::{git_stdout, scenario, single, Play};

#[test]
fn single_actor_rebase_scenario_merges_three_commits() {
    let play = Play::new();
    let report = play
        .run(
            play.settings(PreMergeStrategy::Rebase),
            scenario(vec![single("Bob", "F1", 3)]),
        )
        .expect("run scenario");

    assert!(report.is_success(), "scenario failed: {:?}", report.failures());
    let task = report.task("Bob", "F1").expect("task report");
    assert_eq!(task.state, TaskState::Done);
    assert_eq!(task.commits_pushed, 3);
    assert_eq!(
        task.path,
        vec![
            TaskState::Init,
            TaskState::Branched,
            TaskState::Committing,
            TaskState::PreMerge,
            TaskState::Merging,
            TaskState::Finalize,
        ]
    );

    let log = &report.remote_summary.history["master"];
    let subjects: Vec<&str> = log.iter().map(|commit| commit.summary.as_str()).collect();
    assert_eq!(subjects, vec!["add F1", "a first commit"]);
    assert_eq!(
        log[0].merged_commits.as_deref(),
        Some(&["F1 0/3".to_string(), "F1 1/3".to_string(), "F1 2/3".to_string()][..])
    );
    assert!(report.remote_summary.open_feature_branches.is_empty());

    let journal = play.gateway.journal();
    assert_eq!(journal.count("rebase"), 1);
    let force_pushes = journal
        .calls()
        .iter()
        .filter(|call| call.args.iter().any(|arg| arg == "--force-with-lease"))
        .count();
    assert_eq!(force_pushes, 1);
}

#[test]
fn rebase_runs_once_and_before_merge() {
    let play = Play::new();
    let report = play
        .run(
            play.settings(PreMergeStrategy::Rebase),
            scenario(vec![single("Bob", "F1", 2), single("Alice", "F2", 1)]),
        )
        .expect("run scenario");
    assert!(report.is_success(), "scenario failed: {:?}", report.failures());

    for (actor, feature) in [("Bob", "F1"), ("Alice", "F2")] {
        let calls = play.gateway.journal().calls_in(&play.workdir(actor, feature));
        let rebases: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| call.subcommand() == "rebase")
            .map(|(index, _)| index)
            .collect();
        let merge = calls
            .iter()
            .position(|call| call.subcommand() == "merge")
            .expect("merge call");
        assert_eq!(rebases.len(), 1, "{actor}/{feature} rebased {} times", rebases.len());
        assert!(rebases[0] < merge, "{actor}/{feature} rebased after merging");
    }
}

#[test]
fn view_clone_follows_the_remote() {
    let play = Play::new();
    let report = play
        .run(
            play.settings(PreMergeStrategy::Rebase),
            scenario(vec![single("Bob", "F1", 2)]),
        )
        .expect("run scenario");

    // Two commit refreshes plus one after finalizing.
    assert_eq!(report.refreshes, 3);
    let view_master = git_stdout(&report.view, &["rev-parse", "origin/master"]);
    let remote_master = git_stdout(&report.remote, &["rev-parse", "master"]);
    assert_eq!(view_master, remote_master);
    let remote_branches = git_stdout(&report.view, &["branch", "-r"]);
    assert!(
        !remote_branches.contains("feature/F1"),
        "stale ref not pruned: {remote_branches}"
    );
}

#[test]
fn commit_author_is_the_actor() {
    let play = Play::new();
    play.run(
        play.settings(PreMergeStrategy::None),
        scenario(vec![single("Crusty", "F4", 1)]),
    )
    .expect("run scenario");

    let workdir = play.workdir("Crusty", "F4");
    let author = git_stdout(&workdir, &["log", "-1", "--format=%an <%ae>", "master^2"]);
    assert_eq!(author, "Crusty <Crusty@play>");
    let contents = std::fs::read_to_string(workdir.join("F4.0.txt")).expect("feature file");
    assert!(contents.contains("Crusty was here"));
}

#[test]
fn zero_commit_feature_still_merges_and_cleans_up() {
    let play = Play::new();
    let report = play
        .run(
            play.settings(PreMergeStrategy::Rebase),
            scenario(vec![single("Bob", "F0", 0)]),
        )
        .expect("run scenario");

    let task = report.task("Bob", "F0").expect("task report");
    assert_eq!(task.state, TaskState::Done);
    assert_eq!(task.commits_pushed, 0);
    assert!(!task.path.contains(&TaskState::Committing));
    assert!(report.remote_summary.open_feature_branches.is_empty());
    assert_eq!(play.gateway.journal().count("commit"), 1, "only the seed commit");
}
