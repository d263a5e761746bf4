//! End-to-end expansion against the real filesystem and shell.

use mdimport::env::SystemEnvironment;
use mdimport::imports::{ExpandOptions, Expander};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn expander() -> Expander<SystemEnvironment> {
    mdimport::test_utils::init_test_logging(None);
    Expander::new(
        SystemEnvironment::new().unwrap(),
        ExpandOptions {
            max_parallel: 4,
            bypass_cache: false,
            budget: None,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_expands_file_symbol_range_and_glob() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "docs/intro.md", "Welcome.\n@./details/more.md");
    write(root, "docs/details/more.md", "More details.");
    write(
        root,
        "src/api.ts",
        "import x from 'y';\n\nexport interface User {\n  id: string;\n}\n\nexport const other = 1;\n",
    );
    write(root, "src/notes/a.md", "alpha");
    write(root, "src/notes/b.md", "beta");
    write(
        root,
        "prompt.md",
        "# Prompt\n\n@./docs/intro.md\n\n@./src/api.ts#User\n\n@./src/api.ts:1-1\n\n@./src/notes/*.md\n\n`@./docs/intro.md` stays\n",
    );

    let out = expander().expand_file(&root.join("prompt.md")).await.unwrap();

    assert_eq!(
        out,
        "# Prompt\n\n\
         Welcome.\nMore details.\n\n\
         export interface User {\n  id: string;\n}\n\n\
         import x from 'y';\n\n\
         <a-md path=\"./src/notes/a.md\">\nalpha\n</a-md>\n\n<b-md path=\"./src/notes/b.md\">\nbeta\n</b-md>\n\n\
         `@./docs/intro.md` stays\n"
    );
}

#[tokio::test]
async fn test_missing_import_fails_with_directive() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "prompt.md", "See @./nope.md");

    let err = expander().expand_file(&temp.path().join("prompt.md")).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("File not found"));
    assert!(message.contains("@./nope.md"));
    assert!(message.contains("offset 4"));
}

#[tokio::test]
async fn test_binary_import_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("image.png"), [0x89, b'P', b'N', b'G', 0, 0, 1]).unwrap();

    let err = expander().expand("@./image.png", temp.path()).await.unwrap_err();
    assert!(err.to_string().contains("binary"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_commands_run_in_document_directory() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "marker.txt", "found me");
    write(
        temp.path(),
        "prompt.md",
        "Marker: !`cat marker.txt`\n\n```sh\n#!/bin/sh\necho \"from fence\"\n```\n",
    );

    let out = expander().expand_file(&temp.path().join("prompt.md")).await.unwrap();
    assert_eq!(out, "Marker: found me\n\nfrom fence\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_command_output_is_kept() {
    let temp = TempDir::new().unwrap();
    let out = expander()
        .expand("[!`echo partial; exit 3`]", temp.path())
        .await
        .unwrap();
    assert_eq!(out, "[partial]");
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_output_is_not_reexpanded() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "secret.md", "SECRET");

    let out = expander().expand("!`echo @./secret.md`", temp.path()).await.unwrap();
    assert_eq!(out, "@./secret.md");
}
