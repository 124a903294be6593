//! Caller-facing notifications: decoded, type-tagged events pulled via
//! [`Context::poll_notification`](crate::context::Context::poll_notification).

/// One entry in a `textDocument/documentSymbol` result, flattened from
/// either the flat `SymbolInformation[]` or nested `DocumentSymbol[]`
/// shape, preserving depth-first order.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: i64,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// A decoded semantic token, absolute (not delta-encoded).
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticToken {
    pub line: u32,
    pub character: u32,
    pub length: u32,
    pub token_type: String,
    pub token_modifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Option<i64>,
    pub message: String,
}

/// Tagged variant of one caller-visible event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    TextDocumentSymbols {
        uri: String,
        symbols: Vec<DocumentSymbol>,
    },
    Hover {
        uri: String,
        contents: String,
    },
    SemanticTokens {
        uri: String,
        result_id: Option<String>,
        tokens: Vec<SemanticToken>,
    },
    /// Diagnostics arrive as a server-to-client push, the same way as the
    /// other notification variants.
    PublishDiagnostics {
        uri: String,
        diagnostics: Vec<Diagnostic>,
    },
}

/// Maps a raw LSP `SymbolKind` integer to its name. A pure function with
/// no session state.
pub fn symbol_kind_to_string(kind: i64) -> &'static str {
    match kind {
        1 => "File",
        2 => "Module",
        3 => "Namespace",
        4 => "Package",
        5 => "Class",
        6 => "Method",
        7 => "Property",
        8 => "Field",
        9 => "Constructor",
        10 => "Enum",
        11 => "Interface",
        12 => "Function",
        13 => "Variable",
        14 => "Constant",
        15 => "String",
        16 => "Number",
        17 => "Boolean",
        18 => "Array",
        19 => "Object",
        20 => "Key",
        21 => "Null",
        22 => "EnumMember",
        23 => "Struct",
        24 => "Event",
        25 => "Operator",
        26 => "TypeParameter",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_map_to_names() {
        assert_eq!(symbol_kind_to_string(12), "Function");
        assert_eq!(symbol_kind_to_string(6), "Method");
    }

    #[test]
    fn unknown_kind_maps_to_unknown() {
        assert_eq!(symbol_kind_to_string(999), "Unknown");
    }
}
