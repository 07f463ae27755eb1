mod common;

use clipvault_core::{Category, ClipboardSource, Tier, VaultError, VaultResult};
use common::{Fixture, ScriptedOracle};
use std::io::Write;
use std::time::Duration;

struct FixedClipboard(VaultResult<String>);

impl ClipboardSource for FixedClipboard {
    fn read_text(&self) -> VaultResult<String> {
        match &self.0 {
            Ok(text) => Ok(text.clone()),
            Err(_) => Err(VaultError::PermissionDenied("clipboard".into())),
        }
    }
}

#[tokio::test]
async fn obvious_shapes_are_categorized() {
    let fx = Fixture::new(ScriptedOracle::answering());
    let email = fx.vault.capture("test@example.com", Tier::Fast).await.unwrap();
    let phone = fx.vault.capture("+201234567890", Tier::Fast).await.unwrap();
    let link = fx.vault.capture("https://example.com", Tier::Deep).await.unwrap();
    assert_eq!(email.category, Category::Email);
    assert_eq!(phone.category, Category::Phone);
    assert_eq!(link.category, Category::Link);
    assert_eq!(link.annotation.as_deref(), Some("Deep note on 19 chars"));
    assert_eq!(link.safety_flag, Some(true));
}

#[tokio::test]
async fn remote_category_overrides_local_guess() {
    let fx = Fixture::new(ScriptedOracle::with_category(Category::Text));
    let item = fx.vault.capture("test@example.com", Tier::Fast).await.unwrap();
    assert_eq!(item.category, Category::Text);
}

#[tokio::test]
async fn duplicate_capture_is_case_insensitive() {
    let fx = Fixture::new(ScriptedOracle::answering());
    fx.vault.capture("Hello World", Tier::Fast).await.unwrap();
    let err = fx.vault.capture("hello world", Tier::Fast).await.unwrap_err();
    assert!(matches!(err, VaultError::DuplicateContent));
    let err = fx.vault.capture("Hello World", Tier::Fast).await.unwrap_err();
    assert!(matches!(err, VaultError::DuplicateContent));
    assert_eq!(fx.vault.items().len(), 1);
    // Rejected before the oracle is consulted.
    assert_eq!(fx.oracle.call_count(), 1);
}

#[tokio::test]
async fn empty_input_is_a_no_op() {
    let fx = Fixture::new(ScriptedOracle::answering());
    assert!(matches!(
        fx.vault.capture("   \n", Tier::Fast).await,
        Err(VaultError::EmptyInput)
    ));
    assert!(fx.vault.items().is_empty());
    assert_eq!(fx.oracle.call_count(), 0);
}

#[tokio::test]
async fn oracle_failure_leaves_no_item() {
    let fx = Fixture::provisioned(ScriptedOracle::failing());
    let err = fx.vault.capture("some text", Tier::Fast).await.unwrap_err();
    assert!(matches!(err, VaultError::ClassificationFailed(_)));
    assert!(fx.vault.items().is_empty());
    assert!(fx.mirrored().await.is_empty());
}

#[tokio::test]
async fn clipboard_permission_denied_changes_nothing() {
    let fx = Fixture::new(ScriptedOracle::answering());
    let denied = FixedClipboard(Err(VaultError::PermissionDenied(String::new())));
    assert!(matches!(
        fx.vault.capture_from(&denied, Tier::Fast).await,
        Err(VaultError::PermissionDenied(_))
    ));
    let ok = FixedClipboard(Ok("from clipboard".into()));
    let item = fx.vault.capture_from(&ok, Tier::Fast).await.unwrap();
    assert_eq!(item.content, "from clipboard");
}

#[tokio::test]
async fn newest_item_comes_first() {
    let fx = Fixture::new(ScriptedOracle::answering());
    fx.vault.capture("first", Tier::Fast).await.unwrap();
    fx.vault.capture("second", Tier::Fast).await.unwrap();
    let items = fx.vault.items();
    assert_eq!(items[0].content, "second");
    assert_eq!(items[1].content, "first");
}

#[tokio::test]
async fn image_text_is_stored_as_image_item() {
    let fx = Fixture::new(ScriptedOracle::extracting("Invoice 42"));
    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(b"\x89PNG fake").unwrap();

    let item = fx.vault.capture_image(file.path()).await.unwrap();
    assert_eq!(item.category, Category::Image);
    assert_eq!(item.content, "Invoice 42");
    assert!(item.annotation.is_some());

    let err = fx.vault.capture_image(file.path()).await.unwrap_err();
    assert!(matches!(err, VaultError::DuplicateContent));
    assert_eq!(fx.vault.items().len(), 1);
}

#[tokio::test]
async fn image_with_no_text_is_empty_input() {
    let fx = Fixture::new(ScriptedOracle::extracting("  "));
    let file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    assert!(matches!(
        fx.vault.capture_image(file.path()).await,
        Err(VaultError::EmptyInput)
    ));
    let missing = file.path().with_file_name("does-not-exist.png");
    assert!(matches!(
        fx.vault.capture_image(&missing).await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn translation_attaches_to_item() {
    let fx = Fixture::new(ScriptedOracle::answering());
    let item = fx.vault.capture("good morning", Tier::Fast).await.unwrap();
    let updated = fx.vault.translate_item(&item.id, Tier::Fast).await.unwrap();
    assert_eq!(updated.translation.as_deref(), Some("English: good morning"));
    assert_eq!(fx.vault.items()[0].translation, updated.translation);
    assert!(matches!(
        fx.vault.translate_item("missing", Tier::Fast).await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn reclassify_replaces_annotation_only() {
    let fx = Fixture::new(ScriptedOracle::answering());
    let item = fx.vault.capture("test@example.com", Tier::Fast).await.unwrap();
    let updated = fx.vault.reclassify_item(&item.id, Tier::Deep).await.unwrap();
    assert_eq!(updated.category, Category::Email);
    assert_eq!(updated.annotation.as_deref(), Some("Deep note on 16 chars"));
}

#[tokio::test]
async fn search_delete_and_clear() {
    let fx = Fixture::new(ScriptedOracle::answering());
    let a = fx.vault.capture("Alpha note", Tier::Fast).await.unwrap();
    fx.vault.capture("beta", Tier::Fast).await.unwrap();

    assert_eq!(fx.vault.search("ALPHA").len(), 1);
    assert_eq!(fx.vault.search("note on").len(), 2);
    assert_eq!(fx.vault.search("").len(), 2);

    fx.vault.delete_item(&a.id).unwrap();
    assert!(matches!(fx.vault.delete_item(&a.id), Err(VaultError::NotFound(_))));
    assert_eq!(fx.vault.items().len(), 1);

    assert_eq!(fx.vault.clear_items(), 1);
    assert!(fx.vault.items().is_empty());
}

#[tokio::test]
async fn abandoned_capture_still_completes() {
    let fx = Fixture::new(ScriptedOracle::answering());
    drop(fx.vault.spawn_capture("left behind".to_string(), Tier::Fast));
    for _ in 0..50 {
        if !fx.vault.items().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fx.vault.items()[0].content, "left behind");
}

#[tokio::test]
async fn abandoned_translation_still_completes() {
    let fx = Fixture::new(ScriptedOracle::answering());
    let item = fx.vault.capture("bonjour", Tier::Fast).await.unwrap();
    drop(fx.vault.spawn_translate(item.id.clone(), Tier::Deep));
    for _ in 0..50 {
        if fx.vault.items()[0].translation.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        fx.vault.items()[0].translation.as_deref(),
        Some("English: bonjour")
    );
}
