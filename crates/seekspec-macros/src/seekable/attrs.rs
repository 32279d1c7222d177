//! Parsing of `#[seek(...)]` field attributes.

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Expr, ExprLit, Ident, Lit, Meta, Result, Token,
};

const EXPECTED: &str = "String, Number, Timestamp, Uuid, Enum, Bool, Object";

/// Declared kind of a seekable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekKind {
    String,
    Number,
    Timestamp,
    Uuid,
    Enum,
    Bool,
    Object,
}

impl SeekKind {
    fn parse(name: &str, span: Span) -> Result<Self> {
        match name {
            "String" | "string" => Ok(SeekKind::String),
            "Number" | "number" => Ok(SeekKind::Number),
            "Timestamp" | "timestamp" => Ok(SeekKind::Timestamp),
            "Uuid" | "uuid" => Ok(SeekKind::Uuid),
            "Enum" | "enum" | "enumeration" => Ok(SeekKind::Enum),
            "Bool" | "bool" | "boolean" => Ok(SeekKind::Bool),
            "Object" | "object" | "nested" => Ok(SeekKind::Object),
            other => Err(Error::new(
                span,
                format!("unknown seek kind '{other}', expected one of: {EXPECTED}"),
            )),
        }
    }

    pub fn from_ident(ident: &Ident) -> Result<Self> {
        Self::parse(&ident.to_string(), ident.span())
    }
}

/// Field-level attributes from `#[seek(...)]`.
#[derive(Debug, Clone)]
pub struct SeekAttr {
    pub kind: Option<SeekKind>,
    pub skip: bool,
    /// Name used in filter documents and sort strings.
    pub rename: Option<String>,
}

impl Parse for SeekAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = SeekAttr {
            kind: None,
            skip: false,
            rename: None,
        };

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::Path(p) if p.is_ident("skip") => attr.skip = true,
                Meta::Path(p) => {
                    let ident = p.get_ident().ok_or_else(|| {
                        Error::new(p.span(), format!("expected a seek kind ({EXPECTED}) or skip"))
                    })?;
                    attr.kind = Some(SeekKind::from_ident(ident)?);
                }
                Meta::NameValue(nv) => {
                    let Expr::Lit(ExprLit {
                        lit: Lit::Str(s), ..
                    }) = &nv.value
                    else {
                        return Err(Error::new(nv.value.span(), "expected a string literal"));
                    };
                    if nv.path.is_ident("rename") {
                        attr.rename = Some(s.value());
                    } else if nv.path.is_ident("ty") {
                        attr.kind = Some(SeekKind::parse(&s.value(), s.span())?);
                    } else {
                        return Err(Error::new(
                            nv.path.span(),
                            "unknown attribute, expected rename or ty",
                        ));
                    }
                }
                Meta::List(_) => {
                    return Err(Error::new(
                        meta.span(),
                        "unexpected nested list in #[seek(...)]",
                    ));
                }
            }
        }

        Ok(attr)
    }
}

/// Finds and parses the `#[seek(...)]` attribute of a field.
pub fn parse_seek_attrs(attrs: &[Attribute]) -> Result<Option<SeekAttr>> {
    attrs
        .iter()
        .find(|attr| attr.path().is_ident("seek"))
        .map(|attr| attr.parse_args::<SeekAttr>())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_seek(tokens: &str) -> Result<SeekAttr> {
        syn::parse_str::<SeekAttr>(tokens)
    }

    #[test]
    fn test_seek_kinds() {
        for (tokens, kind) in [
            ("String", SeekKind::String),
            ("number", SeekKind::Number),
            ("Timestamp", SeekKind::Timestamp),
            ("Uuid", SeekKind::Uuid),
            ("Enum", SeekKind::Enum),
            ("boolean", SeekKind::Bool),
            ("Object", SeekKind::Object),
        ] {
            assert_eq!(parse_seek(tokens).unwrap().kind, Some(kind), "{tokens}");
        }
    }

    #[test]
    fn test_seek_keyword_kinds_via_ty() {
        let attr = parse_seek(r#"ty = "enum""#).unwrap();
        assert_eq!(attr.kind, Some(SeekKind::Enum));
        let attr = parse_seek(r#"ty = "bool""#).unwrap();
        assert_eq!(attr.kind, Some(SeekKind::Bool));
    }

    #[test]
    fn test_seek_skip() {
        let attr = parse_seek("skip").unwrap();
        assert!(attr.skip);
        assert_eq!(attr.kind, None);
    }

    #[test]
    fn test_seek_rename() {
        let attr = parse_seek(r#"String, rename = "full_name""#).unwrap();
        assert_eq!(attr.kind, Some(SeekKind::String));
        assert_eq!(attr.rename.as_deref(), Some("full_name"));
    }

    #[test]
    fn test_seek_invalid() {
        let err = parse_seek("Float").unwrap_err();
        assert!(err.to_string().contains("unknown seek kind"));
        assert!(parse_seek(r#"alias = "x""#).is_err());
        assert!(parse_seek("rename = 3").is_err());
        assert!(parse_seek("list(String)").is_err());
    }
}
