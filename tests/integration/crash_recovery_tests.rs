//! Interrupted runs: all resumption state lives in the marker tag and the
//! commit trailers, so a fresh process must pick up exactly where the last
//! one stopped, or refuse loudly.

use super::test_helpers::*;
use patchstack::stack::RunState;
use patchstack::PatchStackError;

#[test]
fn test_resume_after_run_killed_between_patches() {
    let tree = TestTree::with_standard_stack();
    // A run that died right after committing the first patch.
    tree.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();
    let marker = tree.tag_target();

    let report = tree.apply(None, None).unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(!report.marker_created);
    assert_eq!(report.applied, vec![REMOVE_FOO, ADD_FOO_TO_END]);
    assert_eq!(tree.tag_target(), marker);
    assert_eq!(tree.read("file.txt"), "bar\nbaz\nfoo\n");
    assert_eq!(
        tree.descriptors_since_marker(),
        vec![ADD_BAR_AND_BAZ, REMOVE_FOO, ADD_FOO_TO_END]
    );
}

#[test]
fn test_half_applied_patch_is_reported_as_dirty_tree() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();
    let head = tree.head();
    // Killed after `git apply` touched the tree but before the commit.
    tree.write("file.txt", "bar\nbaz\n");

    let err = tree.apply(None, None).unwrap_err();

    assert!(matches!(err, PatchStackError::DirtyTree));
    assert_eq!(tree.head(), head);
    assert_eq!(tree.read("file.txt"), "bar\nbaz\n");
}

#[test]
fn test_commit_without_descriptor_sync_is_not_silently_adopted() {
    let tree = TestTree::with_standard_stack();
    tree.apply(None, Some(ADD_BAR_AND_BAZ)).unwrap();
    // Killed after `git am` created the commit but before the trailer was written.
    let patch = tree.patch_dir().join(REMOVE_FOO);
    git(&tree.path, &["am", "-q", "-C1", patch.to_str().unwrap()]);

    match tree.apply(None, None).unwrap_err() {
        PatchStackError::ForeignCommit { commits, .. } => {
            assert_eq!(commits.len(), 1);
            assert_eq!(commits[0].commit_id, tree.head());
        }
        other => panic!("expected ForeignCommit, got {other:?}"),
    }
}

#[test]
fn test_marker_created_before_first_patch_survives_conflict() {
    let tree = TestTree::with_standard_stack();
    tree.write("file.txt", "wrong line\n");
    git(&tree.path, &["commit", "-q", "-a", "--amend", "--no-edit"]);
    let base = tree.head();

    let report = tree.apply(None, None).unwrap();
    assert_eq!(report.state, RunState::Conflict);
    assert!(report.marker_created);
    assert_eq!(tree.tag_target(), Some(base));

    // Give up on the conflicting attempt and fix the tree by hand.
    git(&tree.path, &["am", "--abort"]);
    tree.write("file.txt", "foo\n");
    git(&tree.path, &["commit", "-q", "-a", "-m", "Restore upstream content"]);

    // The manual commit sits on the stack now and must be flagged.
    assert!(matches!(
        tree.apply(None, None),
        Err(PatchStackError::ForeignCommit { .. })
    ));
}
