mod common;

use common::TempRoot;
use palisade::config::StaticFilesConfig;
use palisade::static_files::{ResolveError, StaticFiles, normalize};
use std::path::PathBuf;

fn files_for(root: &TempRoot) -> StaticFiles {
    let cfg = StaticFilesConfig {
        root_directory: root.path().to_path_buf(),
        ..StaticFilesConfig::default()
    };
    StaticFiles::new(&cfg).unwrap()
}

#[test]
fn test_normalize_plain_paths() {
    assert_eq!(normalize("/").unwrap(), PathBuf::new());
    assert_eq!(normalize("").unwrap(), PathBuf::new());
    assert_eq!(normalize("/a/b.txt").unwrap(), PathBuf::from("a/b.txt"));
    assert_eq!(normalize("//a///b.txt").unwrap(), PathBuf::from("a/b.txt"));
}

#[test]
fn test_normalize_dot_segments() {
    assert_eq!(normalize("/./a/./b").unwrap(), PathBuf::from("a/b"));
    assert_eq!(normalize("/a/b/../c").unwrap(), PathBuf::from("a/c"));
    assert_eq!(normalize("/a/..").unwrap(), PathBuf::new());
}

#[test]
fn test_normalize_strips_query_and_fragment() {
    assert_eq!(normalize("/a.css?v=3").unwrap(), PathBuf::from("a.css"));
    assert_eq!(normalize("/a.css#top").unwrap(), PathBuf::from("a.css"));
    assert_eq!(normalize("/?../../x").unwrap(), PathBuf::new());
}

#[test]
fn test_normalize_rejects_ascent_above_root() {
    let attacks = [
        "/..",
        "/../secret.txt",
        "/a/../../secret.txt",
        "/%2e%2e/secret.txt",
        "/%2E%2E/secret.txt",
        "/a/%2e%2e%2f%2e%2e/secret.txt",
        "/..\\secret.txt",
        "\\..\\..\\secret.txt",
    ];

    for path in attacks {
        assert!(
            matches!(normalize(path), Err(ResolveError::OutsideRoot)),
            "{path}"
        );
    }
}

#[test]
fn test_normalize_rejects_null_bytes() {
    assert!(matches!(normalize("/a\0.txt"), Err(ResolveError::OutsideRoot)));
    assert!(matches!(normalize("/a%00.txt"), Err(ResolveError::OutsideRoot)));
}

#[test]
fn test_normalize_decodes_percent_escapes() {
    assert_eq!(
        normalize("/my%20file.txt").unwrap(),
        PathBuf::from("my file.txt")
    );
    assert!(matches!(normalize("/%ff%fe"), Err(ResolveError::NotFound)));
}

#[test]
fn test_new_rejects_missing_root() {
    let cfg = StaticFilesConfig {
        root_directory: PathBuf::from("/definitely/not/a/real/root"),
        ..StaticFilesConfig::default()
    };
    assert!(StaticFiles::new(&cfg).is_err());
}

#[test]
fn test_new_rejects_file_as_root() {
    let root = TempRoot::new("file-root");
    let file = root.file("plain.txt", "x");
    let cfg = StaticFilesConfig {
        root_directory: file,
        ..StaticFilesConfig::default()
    };
    assert!(StaticFiles::new(&cfg).is_err());
}

#[tokio::test]
async fn test_resolve_root_to_index() {
    let root = TempRoot::new("index");
    root.file("index.html", "<html>Hi</html>");
    let files = files_for(&root);

    let resource = files.resolve("/").await.unwrap();
    assert_eq!(resource.mime, "text/html");
    assert_eq!(resource.len, 15);
    assert_eq!(files.read(&resource).await.unwrap(), b"<html>Hi</html>".to_vec());
}

#[tokio::test]
async fn test_resolve_directory_to_its_index() {
    let root = TempRoot::new("dir-index");
    root.file("docs/index.html", "docs");
    root.dir("empty");
    let files = files_for(&root);

    let resource = files.resolve("/docs/").await.unwrap();
    assert!(resource.path.ends_with("docs/index.html"));

    assert!(matches!(
        files.resolve("/empty").await,
        Err(ResolveError::NotFound)
    ));
}

#[tokio::test]
async fn test_resolve_mime_classification() {
    let root = TempRoot::new("mime");
    root.file("style.CSS", "body{}");
    root.file("blob.unknownext", [0u8, 1, 2]);
    let files = files_for(&root);

    assert_eq!(files.resolve("/style.CSS").await.unwrap().mime, "text/css");
    assert_eq!(
        files.resolve("/blob.unknownext").await.unwrap().mime,
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_resolve_missing_file() {
    let root = TempRoot::new("missing");
    let files = files_for(&root);

    assert!(matches!(
        files.resolve("/nope.txt").await,
        Err(ResolveError::NotFound)
    ));
    assert!(matches!(
        files.resolve("/").await,
        Err(ResolveError::NotFound)
    ));
}

#[tokio::test]
async fn test_resolve_file_used_as_directory() {
    let root = TempRoot::new("notdir");
    root.file("a.txt", "a");
    let files = files_for(&root);

    assert!(matches!(
        files.resolve("/a.txt/b.txt").await,
        Err(ResolveError::NotFound)
    ));
}

#[tokio::test]
async fn test_resolve_traversal_even_when_target_exists() {
    let outer = TempRoot::new("outer");
    outer.file("secret.txt", "top secret");
    let inner = outer.dir("public");
    std::fs::write(inner.join("index.html"), "public").unwrap();

    let cfg = StaticFilesConfig {
        root_directory: inner,
        ..StaticFilesConfig::default()
    };
    let files = StaticFiles::new(&cfg).unwrap();

    assert!(matches!(
        files.resolve("/../secret.txt").await,
        Err(ResolveError::OutsideRoot)
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_resolve_symlink_escape() {
    let outer = TempRoot::new("symlink");
    outer.file("secret.txt", "top secret");
    let inner = outer.dir("public");
    std::os::unix::fs::symlink(outer.path().join("secret.txt"), inner.join("link.txt")).unwrap();

    let strict = StaticFiles::new(&StaticFilesConfig {
        root_directory: inner.clone(),
        ..StaticFilesConfig::default()
    })
    .unwrap();
    assert!(matches!(
        strict.resolve("/link.txt").await,
        Err(ResolveError::OutsideRoot)
    ));

    let relaxed = StaticFiles::new(&StaticFilesConfig {
        root_directory: inner,
        follow_symlinks: true,
        ..StaticFilesConfig::default()
    })
    .unwrap();
    assert!(relaxed.resolve("/link.txt").await.is_ok());
}
