use std::path::{Component, Path};

/// Computes the reference a document at `from_file` uses to reach `to_file`
///
/// The result is relative to the directory containing `from_file` and always
/// uses forward slashes. Segments are percent-encoded so the result can be
/// written straight into HTML or an unquoted CSS `url()`.
///
/// # Examples
///
/// ```
/// use pagemirror::url::relative_reference;
/// use std::path::Path;
///
/// let r = relative_reference(Path::new("out/blog/post.html"), Path::new("out/css/site.css"));
/// assert_eq!(r, "../css/site.css");
/// ```
pub fn relative_reference(from_file: &Path, to_file: &Path) -> String {
    let from_dir: Vec<String> = from_file
        .parent()
        .map(normal_components)
        .unwrap_or_default();
    let target = normal_components(to_file);

    let common = from_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(from_dir.len() - common + target.len() - common);
    parts.extend(std::iter::repeat("..").take(from_dir.len() - common));
    let encoded: Vec<String> = target[common..]
        .iter()
        .map(|part| urlencoding::encode(part).into_owned())
        .collect();
    parts.extend(encoded.iter().map(String::as_str));

    parts.join("/")
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_directory() {
        assert_eq!(
            relative_reference(Path::new("out/index.html"), Path::new("out/about.html")),
            "about.html"
        );
    }

    #[test]
    fn test_descend() {
        assert_eq!(
            relative_reference(Path::new("out/index.html"), Path::new("out/img/a.png")),
            "img/a.png"
        );
    }

    #[test]
    fn test_ascend() {
        assert_eq!(
            relative_reference(
                Path::new("out/blog/2024/post.html"),
                Path::new("out/css/site.css")
            ),
            "../../css/site.css"
        );
    }

    #[test]
    fn test_stylesheet_relative_to_itself() {
        assert_eq!(
            relative_reference(
                Path::new("out/static/css/main.css"),
                Path::new("out/static/img/bg.png")
            ),
            "../img/bg.png"
        );
    }

    #[test]
    fn test_two_pages_reach_same_file() {
        let asset = Path::new("out/img/logo.png");
        let a = relative_reference(Path::new("out/index.html"), asset);
        let b = relative_reference(Path::new("out/docs/guide/index.html"), asset);
        assert_ne!(a, b);
        assert_eq!(
            Path::new("out").join(&a),
            Path::new("out/docs/guide").join(&b).components().fold(
                std::path::PathBuf::new(),
                |mut acc, c| {
                    match c {
                        Component::ParentDir => {
                            acc.pop();
                        }
                        other => acc.push(other),
                    }
                    acc
                }
            )
        );
    }

    #[test]
    fn test_unsafe_characters_encoded() {
        assert_eq!(
            relative_reference(Path::new("out/index.html"), Path::new("out/my files/a (1).png")),
            "my%20files/a%20%281%29.png"
        );
    }

    #[test]
    fn test_self_reference() {
        assert_eq!(
            relative_reference(Path::new("out/a/b.html"), Path::new("out/a/b.html")),
            "b.html"
        );
    }
}
