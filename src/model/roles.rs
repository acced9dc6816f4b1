//! MARC relator roles.
//!
//! Contribution roles arrive as display names ("Author", "Narrator").
//! The annotator splits them into authors and named contributors, and
//! the wire formats want the three-letter MARC relator codes.

/// Role name given to the primary author credit.
pub const PRIMARY_AUTHOR: &str = "Primary Author";
pub const AUTHOR: &str = "Author";
pub const NARRATOR: &str = "Narrator";

/// Whether a role is an authorial credit (rendered without an explicit
/// role on the wire).
pub fn is_author_role(role: &str) -> bool {
    matches!(role, PRIMARY_AUTHOR | AUTHOR)
}

/// MARC relator code for a role name. Roles with no code are dropped
/// from feeds rather than emitted with a made-up code.
pub fn marc_code(role: &str) -> Option<&'static str> {
    Some(match role {
        PRIMARY_AUTHOR | AUTHOR => "aut",
        "Translator" => "trl",
        "Editor" => "edt",
        "Artist" => "art",
        "Illustrator" => "ill",
        "Letterer" => "ltr",
        "Penciler" => "pen",
        "Colorist" => "clr",
        "Inker" => "ink",
        NARRATOR => "nrt",
        "Performer" => "prf",
        "Adapter" => "adp",
        "Afterword" => "aft",
        "Composer" => "cmp",
        "Director" => "drt",
        "Contributor" => "ctb",
        "Foreword" => "wpr",
        "Introduction" => "win",
        "Photographer" => "pht",
        "Producer" => "pro",
        "Transcriber" => "trc",
        "Unknown" => "unk",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_roles() {
        assert!(is_author_role("Author"));
        assert!(is_author_role("Primary Author"));
        assert!(!is_author_role("Narrator"));
    }

    #[test]
    fn test_marc_codes() {
        assert_eq!(marc_code("Author"), Some("aut"));
        assert_eq!(marc_code("Narrator"), Some("nrt"));
        assert_eq!(marc_code("Beta Reader"), None);
    }
}
