use std::fs;
use std::path::Path;

use crate::ast::{CustomBlockDecl, ProgramDocument};
use crate::error::CoreError;

pub fn parse_document(input: &str) -> Result<ProgramDocument, CoreError> {
    Ok(serde_json::from_str(input)?)
}

pub fn parse_custom_block(input: &str) -> Result<CustomBlockDecl, CoreError> {
    Ok(serde_json::from_str(input)?)
}

pub fn read_document(path: impl AsRef<Path>) -> Result<ProgramDocument, CoreError> {
    let source = fs::read_to_string(path)?;
    parse_document(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Int3;

    #[test]
    fn parses_minimal_document() {
        let doc = parse_document(
            r#"{
                "main": {
                    "id": 0,
                    "nodes": [{ "pos": [0, 0, 0], "kind": 36, "settings": [{ "float": 2.5 }] }],
                    "connections": []
                }
            }"#,
        )
        .expect("parse");
        assert_eq!(doc.main.nodes.len(), 1);
        assert_eq!(doc.main.nodes[0].float_setting(0), Some(2.5));
        assert!(doc.custom_blocks.is_empty());
    }

    #[test]
    fn parses_boundary_connections() {
        let doc = parse_document(
            r#"{
                "main": {
                    "id": 0,
                    "connections": [{
                        "from": [32767, 32767, 32767],
                        "from_terminal": [3, 1, 15],
                        "to": [0, 0, 0],
                        "to_terminal": [3, 1, 15],
                        "is_to_from_outside": true
                    }]
                }
            }"#,
        )
        .expect("parse");
        assert_eq!(doc.main.connections[0].from, Int3::OUTSIDE);
        assert!(doc.main.connections[0].is_to_from_outside);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_document("{ \"main\": ").unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
    }
}
