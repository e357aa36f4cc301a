//! Configuration defaults, validation, and file/environment layering.

use std::path::PathBuf;

use figment::Jail;
use pdfrag::config::{CONFIG_FILE, expand_path};
use pdfrag::{ChunkStrategy, RagConfig, RagError};

#[test]
fn defaults_match_documented_values() {
    let config = RagConfig::default();
    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.chunk_overlap, 200);
    assert_eq!(config.top_k, 3);
    assert_eq!(config.embedding_model, "all-MiniLM-L6-v2");
    assert_eq!(config.chunk_strategy, ChunkStrategy::Recursive);
    assert!(config.validate().is_ok());
}

#[test]
fn builder_rejects_inconsistent_values() {
    let cases = [
        RagConfig::builder().chunk_size(0).chunk_overlap(0).build(),
        RagConfig::builder().chunk_size(100).chunk_overlap(100).build(),
        RagConfig::builder().top_k(0).build(),
        RagConfig::builder().embed_batch_size(0).build(),
        RagConfig::builder().embedding_model("  ").build(),
    ];
    for result in cases {
        assert!(matches!(result, Err(RagError::Config(_))), "{result:?}");
    }
}

#[test]
fn file_then_environment_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            CONFIG_FILE,
            r#"
                chunk_size = 500
                chunk_overlap = 50
                chunk_strategy = "fixed"
                top_k = 4
            "#,
        )?;
        jail.set_env("PDFRAG_TOP_K", "7");

        let config = RagConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.chunk_strategy, ChunkStrategy::Fixed);
        assert_eq!(config.top_k, 7);
        assert_eq!(config.embedding_model, "all-MiniLM-L6-v2");
        Ok(())
    });
}

#[test]
fn invalid_file_values_fail_to_load() {
    Jail::expect_with(|jail| {
        jail.create_file(CONFIG_FILE, "chunk_size = 100\nchunk_overlap = 200\n")?;
        let err = RagConfig::load().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
        Ok(())
    });
}

#[test]
fn storage_paths_expand_environment_variables() {
    Jail::expect_with(|jail| {
        jail.set_env("PDFRAG_TEST_ROOT", "/srv/pdfrag");
        jail.set_env("PDFRAG_STORAGE_DIR", "$PDFRAG_TEST_ROOT/index");

        let config = RagConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.storage_dir, Some(PathBuf::from("/srv/pdfrag/index")));
        Ok(())
    });
}

#[test]
fn unknown_variables_are_left_as_written() {
    assert_eq!(
        expand_path("$PDFRAG_SURELY_UNSET_VARIABLE/x"),
        PathBuf::from("$PDFRAG_SURELY_UNSET_VARIABLE/x")
    );
}
