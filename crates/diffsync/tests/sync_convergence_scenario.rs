use std::sync::Arc;

use diffsync::{CharDiff, Clock, Collab, DiffEngine, ManualClock, UserId};
use serde_json::json;

fn user(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

fn wire(diff: &CharDiff, src: &str, dst: &str) -> String {
    diff.serialize(&diff.diff(src, dst))
}

/// End-to-end collaboration round between two clients, driven entirely
/// through the action surface.
#[test]
fn two_client_convergence() {
    let clock = Arc::new(ManualClock::new(100));
    let collab = Collab::new(clock as Arc<dyn Clock>);
    let diff = CharDiff::new();
    let alice = user("alice");
    let bob = user("bob");

    // A registers and bootstraps the document.
    assert!(collab
        .dispatch(&alice, &json!({"action": "registerToFile", "filename": "a.txt"}))
        .is_success());
    assert!(collab
        .dispatch(
            &alice,
            &json!({"action": "sendShadow", "filename": "a.txt", "shadow": "hello"})
        )
        .is_success());

    let doc = diffsync::DocId::from_filename("a.txt").unwrap();
    assert_eq!(collab.sync().server_text(&doc).as_deref(), Some("hello"));
    assert_eq!(collab.sync().shadow(&doc, &alice).as_deref(), Some("hello"));

    // A edits "hello" -> "hello world"; nobody else wrote, so the
    // return patch is the identity.
    let response = collab.dispatch(
        &alice,
        &json!({
            "action": "synchronizeText",
            "filename": "a.txt",
            "patch": wire(&diff, "hello", "hello world"),
        }),
    );
    assert!(response.is_success());
    let back = response.data.unwrap();
    assert!(diff.parse(back.as_str().unwrap()).unwrap().is_identity());
    assert_eq!(
        collab.sync().server_text(&doc).as_deref(),
        Some("hello world")
    );

    // B joins with a current copy and appends "!!".
    assert!(collab
        .dispatch(&bob, &json!({"action": "registerToFile", "filename": "a.txt"}))
        .is_success());
    assert!(collab
        .dispatch(
            &bob,
            &json!({"action": "sendShadow", "filename": "a.txt", "shadow": "hello world"})
        )
        .is_success());
    assert!(collab
        .dispatch(
            &bob,
            &json!({
                "action": "synchronizeText",
                "filename": "a.txt",
                "patch": wire(&diff, "hello world", "hello world!!"),
            })
        )
        .is_success());
    assert_eq!(
        collab.sync().server_text(&doc).as_deref(),
        Some("hello world!!")
    );

    // A resyncs with no local edits and receives B's "!!".
    let mut alice_local = String::from("hello world");
    let response = collab.dispatch(
        &alice,
        &json!({"action": "synchronizeText", "filename": "a.txt", "patch": "[]"}),
    );
    assert!(response.is_success());
    let back = diff
        .parse(response.data.unwrap().as_str().unwrap())
        .unwrap();
    alice_local = diff.apply(&back, &alice_local);
    assert_eq!(alice_local, "hello world!!");
    assert_eq!(
        collab.sync().shadow(&doc, &alice).as_deref(),
        Some("hello world!!")
    );
}

/// Convergence property: a client whose shadow matches a prior server
/// state submits its local diff and ends up equal to the new canonical
/// text after applying the return patch.
#[test]
fn diverged_client_converges_in_one_round() {
    let clock = Arc::new(ManualClock::new(100));
    let collab = Collab::new(clock as Arc<dyn Clock>);
    let diff = CharDiff::new();
    let alice = user("alice");
    let bob = user("bob");
    let doc = diffsync::DocId::from_filename("notes.md").unwrap();

    collab.sync().send_shadow(&doc, &alice, "shared base").unwrap();
    collab.sync().send_shadow(&doc, &bob, "shared base").unwrap();

    // Bob lands an edit first.
    collab
        .sync()
        .synchronize(&doc, &bob, &wire(&diff, "shared base", "shared base, extended"))
        .unwrap();

    // Alice edited a different region of her copy concurrently.
    let alice_local = "the shared base";
    let back = collab
        .sync()
        .synchronize(&doc, &alice, &wire(&diff, "shared base", alice_local))
        .unwrap();
    let converged = diff.apply(&diff.parse(&back).unwrap(), alice_local);

    assert_eq!(Some(converged.as_str()), collab.sync().server_text(&doc).as_deref());
    assert_eq!(
        collab.sync().shadow(&doc, &alice),
        collab.sync().server_text(&doc)
    );
}

/// Second identity-patch sync in a row changes nothing and returns the
/// identity patch again.
#[test]
fn resync_is_idempotent() {
    let clock = Arc::new(ManualClock::new(100));
    let collab = Collab::new(clock as Arc<dyn Clock>);
    let diff = CharDiff::new();
    let alice = user("alice");
    let doc = diffsync::DocId::from_filename("a.txt").unwrap();

    collab.sync().send_shadow(&doc, &alice, "stable text").unwrap();
    let first = collab.sync().synchronize(&doc, &alice, "[]").unwrap();
    let second = collab.sync().synchronize(&doc, &alice, "[]").unwrap();

    assert!(diff.parse(&first).unwrap().is_identity());
    assert!(diff.parse(&second).unwrap().is_identity());
    assert_eq!(collab.sync().server_text(&doc).as_deref(), Some("stable text"));
    assert_eq!(
        collab.sync().shadow(&doc, &alice).as_deref(),
        Some("stable text")
    );
}
