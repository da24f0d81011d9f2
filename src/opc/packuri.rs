/// Provides the PackURI value type for part names within an OPC package.
///
/// A PackURI always begins with a forward slash and uses forward slashes as
/// path separators, per the Open Packaging Conventions. It exposes the
/// components the packaging layer needs: directory, filename, extension,
/// numeric suffix, and the conventional `.rels` location for the part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    /// Create a new PackURI from a string beginning with a forward slash.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self, String> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(format!("PackURI must begin with slash, got '{}'", uri));
        }
        Ok(PackURI { uri })
    }

    /// Create a PackURI by resolving a relative reference against a base URI.
    ///
    /// Translates a relationship target like `"../notesSlides/notesSlide1.xml"`
    /// onto a base URI like `"/ppt/slides"` to produce an absolute part name.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self, String> {
        let joined = Self::join_paths(base_uri, relative_ref);
        let normalized = Self::normalize_path(&joined);
        Self::new(normalized)
    }

    /// Get the base URI (directory portion), e.g. "/ppt/slides" for
    /// "/ppt/slides/slide1.xml". For the package pseudo-partname "/",
    /// returns "/".
    pub fn base_uri(&self) -> &str {
        if self.uri == "/" {
            return "/";
        }

        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// Get the filename portion, e.g. "slide1.xml".
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// Get the filename without its extension, e.g. "slide1".
    pub fn stem(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[..pos],
            None => filename,
        }
    }

    /// Get the extension, e.g. "xml" (no leading period).
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// Get the trailing numeric index for tuple partnames, or None for
    /// singleton partnames.
    ///
    /// Returns 21 for "/ppt/slides/slide21.xml" and None for
    /// "/ppt/presentation.xml".
    pub fn idx(&self) -> Option<u32> {
        let stem = self.stem();
        let start = stem.len() - stem.bytes().rev().take_while(|b| b.is_ascii_digit()).count();
        if start == 0 || start == stem.len() {
            return None;
        }
        stem[start..].parse::<u32>().ok()
    }

    /// Get the membername (URI with the leading slash stripped), the form
    /// used as the zip member name for the package item.
    pub fn membername(&self) -> &str {
        if self.uri == "/" { "" } else { &self.uri[1..] }
    }

    /// Get the relative reference from a base URI to this PackURI.
    ///
    /// For example, "/ppt/notesSlides/notesSlide1.xml" relative to
    /// "/ppt/slides" is "../notesSlides/notesSlide1.xml".
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from_parts: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to_parts: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();

        let common = from_parts
            .iter()
            .zip(to_parts.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut result = String::new();
        for _ in common..from_parts.len() {
            result.push_str("../");
        }
        for (i, part) in to_parts.iter().enumerate().skip(common) {
            if i > common {
                result.push('/');
            }
            result.push_str(part);
        }

        result
    }

    /// Get the PackURI of the `.rels` part corresponding to this PackURI,
    /// e.g. "/ppt/slides/_rels/slide1.xml.rels" for "/ppt/slides/slide1.xml".
    pub fn rels_uri(&self) -> Result<PackURI, String> {
        let filename = self.filename();
        let base_uri = self.base_uri();

        let rels_uri_str = if base_uri == "/" {
            format!("/_rels/{}.rels", filename)
        } else {
            format!("{}/_rels/{}.rels", base_uri, filename)
        };

        Self::new(rels_uri_str)
    }

    /// Get the full URI string.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    fn join_paths(base: &str, rel: &str) -> String {
        if base.ends_with('/') {
            format!("{}{}", base, rel)
        } else {
            format!("{}/{}", base, rel)
        }
    }

    fn normalize_path(path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();

        for part in path.split('/') {
            match part {
                "" | "." => {
                    if parts.is_empty() {
                        parts.push("");
                    }
                },
                ".." => {
                    if parts.len() > 1 {
                        parts.pop();
                    }
                },
                _ => parts.push(part),
            }
        }

        if parts.is_empty() || (parts.len() == 1 && parts[0].is_empty()) {
            return "/".to_string();
        }

        parts.join("/")
    }
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// The package pseudo-partname, representing the package itself
pub const PACKAGE_URI: &str = "/";

/// The URI for the [Content_Types].xml part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packuri_new() {
        assert!(PackURI::new("/ppt/presentation.xml").is_ok());
        assert!(PackURI::new("ppt/presentation.xml").is_err());
    }

    #[test]
    fn test_base_uri_and_filename() {
        let uri = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(uri.base_uri(), "/ppt/slides");
        assert_eq!(uri.filename(), "slide1.xml");
        assert_eq!(uri.stem(), "slide1");
        assert_eq!(uri.ext(), "xml");

        let root = PackURI::new("/").unwrap();
        assert_eq!(root.base_uri(), "/");
        assert_eq!(root.filename(), "");
    }

    #[test]
    fn test_idx() {
        let uri = PackURI::new("/ppt/slides/slide21.xml").unwrap();
        assert_eq!(uri.idx(), Some(21));

        let uri = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(uri.idx(), None);
    }

    #[test]
    fn test_from_rel_ref_resolves_relative_path() {
        let uri = PackURI::from_rel_ref("/ppt/slides", "../notesSlides/notesSlide1.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/notesSlides/notesSlide1.xml");

        let uri = PackURI::from_rel_ref("/ppt", "slides/slide1.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/slides/slide1.xml");
    }

    #[test]
    fn test_relative_ref_between_slide_and_notes() {
        let uri = PackURI::new("/ppt/notesSlides/notesSlide1.xml").unwrap();
        assert_eq!(uri.relative_ref("/ppt/slides"), "../notesSlides/notesSlide1.xml");

        let uri = PackURI::new("/ppt/media/media1.mp3").unwrap();
        assert_eq!(uri.relative_ref("/ppt/slides"), "../media/media1.mp3");
    }

    #[test]
    fn test_rels_uri() {
        let uri = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(uri.rels_uri().unwrap().as_str(), "/ppt/slides/_rels/slide1.xml.rels");

        let root = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(root.rels_uri().unwrap().as_str(), "/ppt/_rels/presentation.xml.rels");
    }

    #[test]
    fn test_membername() {
        let uri = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(uri.membername(), "ppt/presentation.xml");
    }
}
