use super::test_helpers::*;
use patchstack::config::Settings;
use patchstack::git::{DryRun, GitRepository, UnversionedTree};
use patchstack::stack::{apply_patches, ApplyMode, ApplyRequest, RunState};
use patchstack::PatchStackError;
use std::fs;

#[test]
fn test_apply_full_stack_creates_one_commit_per_patch() {
    let tree = TestTree::with_standard_stack();

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(report.marker_created);
    assert_eq!(report.applied, vec![ADD_BAR_AND_BAZ, REMOVE_FOO, ADD_FOO_TO_END]);
    assert_eq!(report.commits.len(), 3);
    assert_eq!(tree.read("file.txt"), "bar\nbaz\nfoo\n");
    assert_eq!(tree.commits_since_marker(), 3);
    assert_eq!(
        tree.descriptors_since_marker(),
        vec![ADD_BAR_AND_BAZ, REMOVE_FOO, ADD_FOO_TO_END]
    );
    assert_eq!(report.commits.last().unwrap(), &tree.head());
}

#[test]
fn test_reapplying_complete_stack_is_a_no_op() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, None).unwrap();
    let head = tree.head();
    let marker = tree.tag_target();

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(report.applied.is_empty());
    assert!(!report.marker_created);
    assert_eq!(tree.head(), head);
    assert_eq!(tree.tag_target(), marker);
}

#[test]
fn test_split_runs_match_single_run() {
    let single = TestTree::with_standard_stack();
    single.apply(None, None).unwrap();

    let split = TestTree::with_standard_stack();
    split.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();
    assert_eq!(split.read("file.txt"), "bar\nbaz\nfoo\n");
    split.apply(Some(REMOVE_FOO), Some(REMOVE_FOO)).unwrap();
    assert_eq!(split.read("file.txt"), "bar\nbaz\n");
    split.apply(Some(ADD_FOO_TO_END), None).unwrap();

    assert_eq!(split.read("file.txt"), single.read("file.txt"));
    assert_eq!(split.commits_since_marker(), single.commits_since_marker());
    assert_eq!(
        split.descriptors_since_marker(),
        single.descriptors_since_marker()
    );
}

#[test]
fn test_conflict_on_first_patch_leaves_markers_and_no_commit() {
    let tree = TestTree::with_standard_stack();
    tree.write("file.txt", "wrong line\n");
    git(&tree.path, &["commit", "-q", "-a", "--amend", "--no-edit"]);

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Conflict);
    assert!(report.applied.is_empty());
    match report.failure {
        Some(PatchStackError::ApplyConflict { ref patch, ref tool }) => {
            assert_eq!(patch, ADD_BAR_AND_BAZ);
            assert_eq!(tool, "am");
        }
        ref other => panic!("expected ApplyConflict, got {other:?}"),
    }
    assert_eq!(tree.commits_since_marker(), 0);
    assert!(tree.read("file.txt").contains("<<<<<<<"));
}

#[test]
fn test_conflict_keeps_earlier_commits_of_the_run() {
    let tree = TestTree::new();
    tree.write("other.txt", "one\n");
    git(&tree.path, &["add", "--all"]);
    git(&tree.path, &["commit", "-q", "-m", "Add other"]);
    tree.add_patch_chain(&[
        PatchSpec {
            name: ADD_BAR_AND_BAZ,
            message: "Add bar and baz",
            file: "file.txt",
            content: "bar\nbaz\nfoo\n",
        },
        PatchSpec {
            name: "long-term-0100-change-other.patch",
            message: "Change other",
            file: "other.txt",
            content: "two\n",
        },
    ]);
    tree.write("other.txt", "uno\n");
    git(&tree.path, &["commit", "-q", "-a", "--amend", "--no-edit"]);

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Conflict);
    assert_eq!(report.applied, vec![ADD_BAR_AND_BAZ]);
    assert_eq!(report.commits.len(), 1);
    assert_eq!(tree.descriptors_since_marker(), vec![ADD_BAR_AND_BAZ]);
    assert_eq!(tree.read("file.txt"), "bar\nbaz\nfoo\n");
    assert!(tree.read("other.txt").contains("<<<<<<<"));
}

#[test]
fn test_stale_descriptor_in_patch_is_overwritten_with_file_name() {
    let tree = TestTree::new();
    tree.add_patch_chain(&[PatchSpec {
        name: ADD_FOO_TO_END,
        message: "Add foo\n\npatch-name: backward-compatibility-0500-old-patch-name.patch",
        file: "file.txt",
        content: "foo\nfoo\n",
    }]);

    let report = tree.apply(None, None).unwrap();

    assert!(report.is_success());
    assert_eq!(tree.descriptors_since_marker(), vec![ADD_FOO_TO_END]);
    let message = git(&tree.path, &["log", "-1", "--format=%B"]);
    assert!(message.starts_with("Add foo"));
    assert!(!message.contains("old-patch-name"));
}

#[test]
fn test_plain_diff_is_committed_with_descriptor() {
    let tree = TestTree::new();
    let name = "cherry-pick-0001-append-qux.patch";
    fs::write(
        tree.patch_dir().join(name),
        "--- a/file.txt\n+++ b/file.txt\n@@ -1 +1,2 @@\n foo\n+qux\n",
    )
    .unwrap();
    git(&tree.path, &["add", "--all"]);
    git(&tree.path, &["commit", "-q", "-m", "Add plain patch"]);

    let report = tree.apply(None, None).unwrap();

    assert!(report.is_success());
    assert_eq!(tree.read("file.txt"), "foo\nqux\n");
    assert_eq!(tree.descriptors_since_marker(), vec![name]);
    assert!(tree.is_clean());
}

#[test]
fn test_plain_diff_commit_leaves_untracked_files_alone() {
    let tree = TestTree::new();
    let name = "cherry-pick-0001-append-qux.patch";
    fs::write(
        tree.patch_dir().join(name),
        "--- a/file.txt\n+++ b/file.txt\n@@ -1 +1,2 @@\n foo\n+qux\n",
    )
    .unwrap();
    git(&tree.path, &["add", "--all"]);
    git(&tree.path, &["commit", "-q", "-m", "Add plain patch"]);
    fs::create_dir_all(tree.path.join(".patchstack")).unwrap();
    tree.write(".patchstack/config.json", "{}\n");
    tree.write("notes.txt", "local notes\n");

    let report = tree.apply(None, None).unwrap();

    assert!(report.is_success());
    let files = git(&tree.path, &["show", "--name-only", "--format=", "HEAD"]);
    assert_eq!(files.trim(), "file.txt");
    assert!(tree.path.join("notes.txt").exists());
}

#[test]
fn test_plain_diff_without_blob_ids_fails_without_conflict_markers() {
    let tree = TestTree::new();
    let name = "cherry-pick-0001-append-qux.patch";
    fs::write(
        tree.patch_dir().join(name),
        "--- a/file.txt\n+++ b/file.txt\n@@ -1 +1,2 @@\n foo\n+qux\n",
    )
    .unwrap();
    git(&tree.path, &["add", "--all"]);
    git(&tree.path, &["commit", "-q", "-m", "Add plain patch"]);
    tree.write("file.txt", "wrong line\n");
    git(&tree.path, &["commit", "-q", "-a", "-m", "Diverge"]);

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Failed);
    match report.failure {
        Some(PatchStackError::ApplyFailed { ref patch, ref detail }) => {
            assert_eq!(patch, name);
            assert!(detail.contains("no `index` lines"));
        }
        ref other => panic!("expected ApplyFailed, got {other:?}"),
    }
    assert_eq!(tree.commits_since_marker(), 0);
    assert_eq!(tree.read("file.txt"), "wrong line\n");
    assert!(tree.is_clean());
}

#[test]
fn test_plain_diff_with_blob_ids_conflicts_three_way() {
    let tree = TestTree::new();
    tree.write("file.txt", "foo\nqux\n");
    let diff = git(&tree.path, &["diff", "--full-index"]);
    git(&tree.path, &["checkout", "--", "file.txt"]);
    let name = "cherry-pick-0001-append-qux.patch";
    fs::write(tree.patch_dir().join(name), diff).unwrap();
    git(&tree.path, &["add", "--all"]);
    git(&tree.path, &["commit", "-q", "-m", "Add plain patch"]);
    tree.write("file.txt", "wrong line\n");
    git(&tree.path, &["commit", "-q", "-a", "-m", "Diverge"]);

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Conflict);
    match report.failure {
        Some(PatchStackError::ApplyConflict { ref patch, ref tool }) => {
            assert_eq!(patch, name);
            assert_eq!(tool, "apply");
        }
        ref other => panic!("expected ApplyConflict, got {other:?}"),
    }
    assert_eq!(tree.commits_since_marker(), 0);
    assert!(tree.read("file.txt").contains("<<<<<<<"));
}

#[test]
fn test_no_commit_mode_changes_files_only() {
    let tree = TestTree::with_standard_stack();
    let head = tree.head();

    let request = ApplyRequest {
        no_commit: true,
        last: Some(ADD_BAR_AND_BAZ.to_string()),
        ..ApplyRequest::default()
    };
    let report = apply_patches(&tree.repo(), &Settings::default(), &request).unwrap();

    assert!(report.is_success());
    assert_eq!(report.applied, vec![ADD_BAR_AND_BAZ]);
    assert!(report.commits.is_empty());
    assert_eq!(tree.head(), head);
    assert_eq!(tree.read("file.txt"), "bar\nbaz\nfoo\n");
    assert!(!tree.is_clean());
}

#[test]
fn test_dry_run_leaves_no_trace() {
    let tree = TestTree::with_standard_stack();
    let head = tree.head();

    let dry = DryRun::new(GitRepository::open(&tree.path).unwrap());
    let report = apply_patches(&dry, &Settings::default(), &ApplyRequest::default()).unwrap();

    assert!(report.is_success());
    assert!(report.dry_run);
    assert_eq!(report.applied.len(), 3);
    assert_eq!(tree.head(), head);
    assert_eq!(tree.tag_target(), None);
    assert_eq!(tree.read("file.txt"), "foo\n");
    assert!(tree.is_clean());
}

#[test]
fn test_dry_run_still_reports_dirty_tree() {
    let tree = TestTree::with_standard_stack();
    tree.write("file.txt", "local edit\n");

    let dry = DryRun::new(tree.repo());
    let err = apply_patches(&dry, &Settings::default(), &ApplyRequest::default()).unwrap_err();
    assert!(matches!(err, PatchStackError::DirtyTree));
}

#[test]
fn test_detached_head_is_rejected() {
    let tree = TestTree::with_standard_stack();
    git(&tree.path, &["checkout", "-q", "--detach"]);

    assert!(matches!(
        tree.apply(None, None),
        Err(PatchStackError::DetachedHead)
    ));
    assert_eq!(tree.tag_target(), None);
}

#[test]
fn test_first_before_applied_patch_is_rejected_without_mutation() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, Some(REMOVE_FOO)).unwrap();
    let head = tree.head();

    let err = tree.apply(Some(ADD_BAR_AND_BAZ), None).unwrap_err();
    assert!(matches!(err, PatchStackError::FirstPrecedesApplied { .. }));
    assert_eq!(tree.head(), head);
}

#[test]
fn test_last_before_first_is_rejected_without_mutation() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();
    let head = tree.head();

    match tree.apply(Some(ADD_FOO_TO_END), Some(REMOVE_FOO)).unwrap_err() {
        PatchStackError::RangeInverted { first, last } => {
            assert_eq!(first, ADD_FOO_TO_END);
            assert_eq!(last, REMOVE_FOO);
        }
        other => panic!("expected RangeInverted, got {other:?}"),
    }
    assert_eq!(tree.head(), head);
}

#[test]
fn test_last_already_applied_is_a_no_op() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, None).unwrap();
    let head = tree.head();

    let report = tree.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(report.applied.is_empty());
    assert_eq!(tree.head(), head);
    assert_eq!(tree.commits_since_marker(), 3);
}

#[test]
fn test_skipping_ahead_on_fresh_stack_is_rejected_without_mutation() {
    let tree = TestTree::new();
    tree.write("a.txt", "a
");
    tree.write("b.txt", "b
");
    git(&tree.path, &["add", "--all"]);
    git(&tree.path, &["commit", "-q", "-m", "Add independent files"]);
    tree.add_patch_chain(&[
        PatchSpec {
            name: "long-term-0001-change-a.patch",
            message: "Change a",
            file: "a.txt",
            content: "a2\n",
        },
        PatchSpec {
            name: "long-term-0002-change-b.patch",
            message: "Change b",
            file: "b.txt",
            content: "b2\n",
        },
    ]);
    let head = tree.head();

    let err = tree
        .apply(
            Some("long-term-0002-change-b.patch"),
            Some("long-term-0002-change-b.patch"),
        )
        .unwrap_err();

    match err {
        PatchStackError::OrderViolation { expected, actual } => {
            assert_eq!(expected, vec!["long-term-0001-change-a.patch"]);
            assert_eq!(actual, vec!["long-term-0002-change-b.patch"]);
        }
        other => panic!("expected OrderViolation, got {other:?}"),
    }
    assert_eq!(tree.head(), head);
    assert_eq!(tree.tag_target(), None);
    assert_eq!(tree.read("b.txt"), "b\n");
}

#[test]
fn test_skipping_ahead_on_existing_stack_is_rejected_without_mutation() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();
    let head = tree.head();

    assert!(matches!(
        tree.apply(Some(ADD_FOO_TO_END), None),
        Err(PatchStackError::OrderViolation { .. })
    ));
    assert_eq!(tree.head(), head);
    assert_eq!(tree.descriptors_since_marker(), vec![ADD_BAR_AND_BAZ]);
}

#[test]
fn test_malformed_file_in_patch_dir_fails_before_any_mutation() {
    let tree = TestTree::with_standard_stack();
    fs::write(tree.patch_dir().join("README"), "not a patch\n").unwrap();

    let err = tree.apply(None, None).unwrap_err();
    assert!(matches!(err, PatchStackError::MalformedPatchName { ref name, .. } if name == "README"));
    assert_eq!(tree.tag_target(), None);
}

#[cfg(unix)]
#[test]
fn test_script_patch_changes_are_committed() {
    let tree = TestTree::new();
    tree.add_script_patch(
        "cherry-pick-0001-generate-header.sh",
        "echo '#define GENERATED 1' > generated.h",
    );

    let report = tree.apply(None, None).unwrap();

    assert!(report.is_success());
    assert_eq!(report.commits.len(), 1);
    assert_eq!(tree.read("generated.h"), "#define GENERATED 1\n");
    assert_eq!(
        tree.descriptors_since_marker(),
        vec!["cherry-pick-0001-generate-header.sh"]
    );
    let subject = git(&tree.path, &["log", "-1", "--format=%s"]);
    assert_eq!(subject.trim(), "Temporary commit for script-based patch");
}

#[cfg(unix)]
#[test]
fn test_script_commit_excludes_files_untracked_before_the_run() {
    let tree = TestTree::new();
    tree.add_script_patch(
        "cherry-pick-0001-generate-header.sh",
        "echo '#define GENERATED 1' > generated.h\necho 'bar' >> file.txt",
    );
    fs::create_dir_all(tree.path.join(".patchstack")).unwrap();
    tree.write(".patchstack/config.json", "{}\n");
    tree.write("notes.txt", "local notes\n");

    let report = tree.apply(None, None).unwrap();

    assert!(report.is_success());
    let files = git(&tree.path, &["show", "--name-only", "--format=", "HEAD"]);
    let mut files: Vec<&str> = files.lines().filter(|l| !l.is_empty()).collect();
    files.sort_unstable();
    assert_eq!(files, vec!["file.txt", "generated.h"]);
    let untracked = git(&tree.path, &["status", "--porcelain"]);
    assert!(untracked.contains("?? notes.txt"));
    assert!(untracked.contains("?? .patchstack/"));
}

#[cfg(unix)]
#[test]
fn test_failing_script_halts_the_run() {
    let tree = TestTree::with_standard_stack();
    tree.add_script_patch("cherry-pick-0001-broken.sh", "exit 7");

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.applied, vec![ADD_BAR_AND_BAZ, REMOVE_FOO]);
    assert!(matches!(
        report.failure,
        Some(PatchStackError::ScriptFailed { ref patch, .. }) if patch == "cherry-pick-0001-broken.sh"
    ));
    assert_eq!(tree.commits_since_marker(), 2);
}

#[test]
fn test_ebuild_mode_patches_plain_tree() {
    let tree = TestTree::with_standard_stack();
    let export = tempfile::TempDir::new().unwrap();
    if git2::Repository::discover(export.path()).is_ok() {
        return;
    }
    fs::write(export.path().join("file.txt"), "foo\n").unwrap();
    let patch_dir = export.path().join(PATCH_DIR);
    fs::create_dir_all(&patch_dir).unwrap();
    for name in [ADD_BAR_AND_BAZ, REMOVE_FOO, ADD_FOO_TO_END] {
        fs::copy(tree.patch_dir().join(name), patch_dir.join(name)).unwrap();
    }

    let unversioned = UnversionedTree::new(export.path()).unwrap();
    let request = ApplyRequest {
        mode: ApplyMode::Unversioned,
        ..ApplyRequest::default()
    };
    let report = apply_patches(&unversioned, &Settings::default(), &request).unwrap();

    assert!(report.is_success());
    assert!(report.commits.is_empty());
    assert!(!report.marker_created);
    assert_eq!(
        fs::read_to_string(export.path().join("file.txt")).unwrap(),
        "bar\nbaz\nfoo\n"
    );
}

#[test]
fn test_ebuild_mode_fails_fast_without_three_way() {
    let export = tempfile::TempDir::new().unwrap();
    if git2::Repository::discover(export.path()).is_ok() {
        return;
    }
    let tree = TestTree::with_standard_stack();
    fs::write(export.path().join("file.txt"), "wrong line\n").unwrap();
    let patch_dir = export.path().join(PATCH_DIR);
    fs::create_dir_all(&patch_dir).unwrap();
    fs::copy(
        tree.patch_dir().join(ADD_BAR_AND_BAZ),
        patch_dir.join(ADD_BAR_AND_BAZ),
    )
    .unwrap();

    let unversioned = UnversionedTree::new(export.path()).unwrap();
    let request = ApplyRequest {
        mode: ApplyMode::Unversioned,
        ..ApplyRequest::default()
    };
    let report = apply_patches(&unversioned, &Settings::default(), &request).unwrap();

    assert_eq!(report.state, RunState::Failed);
    assert!(matches!(
        report.failure,
        Some(PatchStackError::ApplyFailed { ref patch, .. }) if patch == ADD_BAR_AND_BAZ
    ));
    assert_eq!(
        fs::read_to_string(export.path().join("file.txt")).unwrap(),
        "wrong line\n"
    );
}
