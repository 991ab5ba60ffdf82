use fepkit::engine::fragment::AtomLink;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid atom link '{0}'. Expected 'INITIAL:FINAL' (e.g., '_H3_:_C4_').")]
    InvalidLinkFormat(String),

    #[error("Component '{component}' cannot be empty in atom link '{link}'.")]
    EmptyComponent {
        component: &'static str,
        link: String,
    },

    #[error("Atom link '{0}' pairs an atom name with itself.")]
    SelfLink(String),
}

/// Parses `INITIAL:FINAL`. Names keep their inner underscores and spaces,
/// only surrounding whitespace is trimmed.
pub fn parse_atom_link(s: &str) -> Result<AtomLink, ParseError> {
    let (initial, final_name) = s
        .split_once(':')
        .ok_or_else(|| ParseError::InvalidLinkFormat(s.to_string()))?;
    if final_name.contains(':') {
        return Err(ParseError::InvalidLinkFormat(s.to_string()));
    }
    let (initial, final_name) = (initial.trim(), final_name.trim());
    if initial.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "initial",
            link: s.to_string(),
        });
    }
    if final_name.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "final",
            link: s.to_string(),
        });
    }
    if initial == final_name {
        return Err(ParseError::SelfLink(s.to_string()));
    }
    Ok(AtomLink::new(initial, final_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_is_split_on_the_colon() {
        assert_eq!(
            parse_atom_link("_H3_:_C4_"),
            Ok(AtomLink::new("_H3_", "_C4_"))
        );
        assert_eq!(
            parse_atom_link(" _H3_ : _C4_ "),
            Ok(AtomLink::new("_H3_", "_C4_"))
        );
    }

    #[test]
    fn malformed_links_are_rejected() {
        assert!(matches!(
            parse_atom_link("_H3_"),
            Err(ParseError::InvalidLinkFormat(_))
        ));
        assert!(matches!(
            parse_atom_link("a:b:c"),
            Err(ParseError::InvalidLinkFormat(_))
        ));
        assert!(matches!(
            parse_atom_link(":_C4_"),
            Err(ParseError::EmptyComponent {
                component: "initial",
                ..
            })
        ));
        assert!(matches!(
            parse_atom_link("_C4_:_C4_"),
            Err(ParseError::SelfLink(_))
        ));
    }
}
