//! OpenSeadragon page for browsing one container.
//!
//! The page fetches the container's `ImageProperties.xml` from the Zoomify
//! mount and hands the dimensions to OpenSeadragon's Zoomify tile source, so
//! the browser requests exactly the same URLs any Zoomify client would.

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// JSON string literal that is also safe inside a `<script>` element.
fn script_string(s: &str) -> String {
    serde_json::Value::from(s)
        .to_string()
        .replace("</", "<\\/")
}

/// URL path for `container` under `mount`, each segment percent-encoded.
pub fn container_url(mount: &str, container: &str) -> String {
    let segments: Vec<String> = container
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();
    format!("{}/{}/", mount.trim_end_matches('/'), segments.join("/"))
}

/// Render the viewer page for the container at `container`
/// (repository-relative).
pub fn generate_viewer_html(container: &str, mount: &str) -> String {
    let tiles_url = container_url(mount, container);
    let properties_url = format!("{}ImageProperties.xml", tiles_url);

    let title = html_escape(container);
    let tiles_url = script_string(&tiles_url);
    let properties_url = script_string(&properties_url);

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Zoomify Viewer - {title}</title>
    <script src="https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon.min.js"></script>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            background: #0f0f0f;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            overflow: hidden;
        }}
        #viewer {{ width: 100vw; height: 100vh; }}
        .info-panel {{
            position: absolute;
            top: 16px;
            left: 16px;
            background: rgba(0, 0, 0, 0.85);
            color: #fff;
            padding: 12px 16px;
            border-radius: 8px;
            font-size: 13px;
            max-width: 360px;
            word-break: break-all;
            z-index: 1000;
        }}
        .info-panel .meta {{ color: rgba(255, 255, 255, 0.7); font-size: 12px; margin-top: 4px; }}
        .error {{ color: #f87171; }}
    </style>
</head>
<body>
    <div id="viewer"></div>
    <div class="info-panel">
        <h2>{title}</h2>
        <div class="meta" id="meta">Loading&hellip;</div>
    </div>
    <script>
        (function () {{
            var tilesUrl = {tiles_url};
            var propertiesUrl = {properties_url};
            var meta = document.getElementById("meta");

            fetch(propertiesUrl)
                .then(function (response) {{
                    if (!response.ok) {{
                        throw new Error("HTTP " + response.status);
                    }}
                    return response.text();
                }})
                .then(function (text) {{
                    var doc = new DOMParser().parseFromString(text, "text/xml");
                    var props = doc.getElementsByTagName("IMAGE_PROPERTIES")[0];
                    if (!props) {{
                        throw new Error("malformed ImageProperties.xml");
                    }}
                    var width = parseInt(props.getAttribute("WIDTH"), 10);
                    var height = parseInt(props.getAttribute("HEIGHT"), 10);
                    var tileSize = parseInt(props.getAttribute("TILESIZE"), 10);

                    meta.textContent = width + " × " + height + " px, " + tileSize + " px tiles";

                    OpenSeadragon({{
                        id: "viewer",
                        prefixUrl: "https://cdn.jsdelivr.net/npm/openseadragon@4.1/build/openseadragon/images/",
                        showNavigator: true,
                        tileSources: {{
                            type: "zoomifytileservice",
                            width: width,
                            height: height,
                            tileSize: tileSize,
                            tilesUrl: tilesUrl
                        }}
                    }});
                }})
                .catch(function (err) {{
                    meta.textContent = "Failed to load image: " + err.message;
                    meta.className = "meta error";
                }});
        }})();
    </script>
</body>
</html>
"##
    )
}
