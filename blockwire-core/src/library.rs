//! Loading custom-block documents from a library directory.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::analysis::build_program;
use crate::ast::{CustomBlockDecl, ProgramDocument};
use crate::catalog::BlockCatalog;
use crate::error::CoreError;
use crate::hir::Program;
use crate::parser::parse_custom_block;

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryFile {
    pub path: PathBuf,
    pub block: CustomBlockDecl,
}

/// Load every `*.json` custom-block document under `root`, in path order.
pub fn load_library(root: impl AsRef<Path>) -> Result<Vec<LibraryFile>, CoreError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CoreError::MissingLibrary(root.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable library entry");
                None
            }
        })
    {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            let contents = fs::read_to_string(path)?;
            let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            tracing::debug!(path = %relative.display(), "loading custom block");
            files.push(LibraryFile {
                path: relative,
                block: parse_custom_block(&contents)?,
            });
        }
    }
    Ok(files)
}

/// Register the document's custom blocks and the library's on a copy of
/// `catalog`, then analyse the document.
///
/// A block the document defines itself shadows a library block with the
/// same id.
pub fn load_program(
    catalog: &BlockCatalog,
    mut document: ProgramDocument,
    library: Vec<LibraryFile>,
) -> Result<Program, CoreError> {
    for file in library {
        if document
            .custom_blocks
            .iter()
            .any(|block| block.id == file.block.id)
        {
            tracing::debug!(id = file.block.id, path = %file.path.display(), "library block shadowed");
            continue;
        }
        document.custom_blocks.push(file.block);
    }
    let mut catalog = catalog.clone();
    for block in &document.custom_blocks {
        catalog.register_custom(block)?;
    }
    build_program(&catalog, &document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeDecl, ProgramGraph};
    use crate::layout::Int3;

    const BLOCK: &str = r#"{
        "id": 1000,
        "name": "Nothing",
        "footprint": { "width": 1, "depth": 1 },
        "graph": { "id": 1000 }
    }"#;

    #[test]
    fn loads_nested_documents_in_path_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("create nested dir");
        fs::write(dir.path().join("a.json"), BLOCK).expect("write root block");
        fs::write(nested.join("b.json"), BLOCK.replace("1000", "1001")).expect("write nested block");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write other file");

        let files = load_library(dir.path()).expect("library should load");
        let paths: Vec<_> = files.iter().map(|file| file.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("nested/b.json")]);
        assert_eq!(files[1].block.id, 1001);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directories_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.json"), BLOCK).expect("write block");
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).expect("create locked dir");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("lock dir");

        let files = load_library(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock dir");
        let files = files.expect("library should load");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("a.json"));
    }

    #[test]
    fn reports_missing_root() {
        let err = load_library("./path/that/does/not/exist").unwrap_err();
        assert!(matches!(err, CoreError::MissingLibrary(_)));
    }

    #[test]
    fn library_blocks_are_instantiable() {
        let catalog = BlockCatalog::stock().expect("stock catalog");
        let library = vec![LibraryFile {
            path: PathBuf::from("a.json"),
            block: parse_custom_block(BLOCK).expect("block"),
        }];
        let mut main = ProgramGraph::new(0);
        main.nodes.push(NodeDecl::new(Int3::new(0, 0, 0), 1000));
        let document = ProgramDocument {
            main,
            custom_blocks: Vec::new(),
        };

        let program = load_program(&catalog, document, library).expect("program");
        assert_eq!(program.environments.len(), 2);
        assert!(program.nodes.is_empty());
    }

    #[test]
    fn document_blocks_shadow_library_blocks() {
        let catalog = BlockCatalog::stock().expect("stock catalog");
        let block = parse_custom_block(BLOCK).expect("block");
        let library = vec![LibraryFile {
            path: PathBuf::from("a.json"),
            block: block.clone(),
        }];
        let document = ProgramDocument {
            main: ProgramGraph::new(0),
            custom_blocks: vec![block],
        };
        assert!(load_program(&catalog, document, library).is_ok());
    }
}
