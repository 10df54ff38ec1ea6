//! Static object-movie viewer page (jQuery Reel).

use std::path::Path;

use reelstab_common::{StabError, StabResult};
use reelstab_model::ViewerDescriptor;

const JQUERY_URL: &str = "http://code.jquery.com/jquery-1.9.1.min.js";
const REEL_URL: &str = "http://code.vostrel.net/jquery.reel-bundle.js";

/// Render the viewer page for `descriptor`.
///
/// Frame 1 is the static preview and frames `02..N` form the reel. With a
/// single frame the page shows it as a plain image; with none it says so.
pub fn render_viewer_page(descriptor: &ViewerDescriptor, width: u32, height: u32) -> String {
    let body = match (descriptor.preview_path(), descriptor.images_attribute()) {
        (Some(preview), Some(images)) => format!(
            r#"<img class="reel" data-images="{}" height="{height}" id="image" src="{}" width="{width}"/>"#,
            escape_attr(&images),
            escape_attr(&preview),
        ),
        (Some(preview), None) => format!(
            r#"<img height="{height}" id="image" src="{}" width="{width}"/>"#,
            escape_attr(&preview),
        ),
        _ => "<p>No frames were sampled.</p>".to_string(),
    };

    format!(
        concat!(
            r#"<!DOCTYPE html><html data-id="sequence-camera" data-type="example"><head>"#,
            r#"<title>Stabilized Camera Sequence Object Movie</title>"#,
            r#"<meta charset="utf-8" content="text/html" http-equiv="Content-type"/>"#,
            r#"<script src="{jquery}" type="text/javascript"></script>"#,
            r#"<script src="{reel}" type="text/javascript"></script>"#,
            r#"</head><body><center>{body}</center></body></html>"#,
            "\n"
        ),
        jquery = JQUERY_URL,
        reel = REEL_URL,
        body = body,
    )
}

/// Write the rendered page to `path`.
pub fn write_viewer_page(path: &Path, html: &str) -> StabResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StabError::OutputDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, html)?;
    tracing::info!(path = %path.display(), "Wrote viewer page");
    Ok(())
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_references_frame_range() {
        let desc = ViewerDescriptor::new(12, "/srv/reel_images", "rep_stable_video");
        let html = render_viewer_page(&desc, 960, 540);
        assert!(html.contains(
            r#"data-images="/srv/reel_images/rep_stable_video_frame##.jpg|02..12""#
        ));
        assert!(html.contains(r#"src="/srv/reel_images/rep_stable_video_frame01.jpg""#));
        assert!(html.contains(r#"width="960""#));
        assert!(html.contains(r#"height="540""#));
        assert!(html.contains(REEL_URL));
    }

    #[test]
    fn test_single_frame_page_has_no_reel() {
        let html = render_viewer_page(&ViewerDescriptor::new(1, "out", "clip"), 640, 360);
        assert!(!html.contains("data-images"));
        assert!(html.contains(r#"src="out/clip_frame01.jpg""#));
    }

    #[test]
    fn test_empty_page() {
        let html = render_viewer_page(&ViewerDescriptor::new(0, "out", "clip"), 640, 360);
        assert!(html.contains("No frames were sampled."));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let html = render_viewer_page(&ViewerDescriptor::new(3, "a&b", "c\"d"), 10, 10);
        assert!(html.contains("a&amp;b/c&quot;d_frame##.jpg|02..3"));
    }

    #[test]
    fn test_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site").join("index.html");
        write_viewer_page(&path, "<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
