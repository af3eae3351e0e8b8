/// Route prefix under which stored files and derivatives are served.
pub const DOWNLOADS_PATH_PREFIX: &str = "/downloads";

/// Bounding box for generated thumbnails (shrink only, aspect preserved).
pub const DEFAULT_THUMBNAIL_MAX_WIDTH: u32 = 200;
pub const DEFAULT_THUMBNAIL_MAX_HEIGHT: u32 = 150;

/// Name under which the thumbnail rendition is stored and served.
pub const THUMBNAIL_DERIVATIVE_NAME: &str = "thumbnail";

/// Name under which extracted full text is stored and served.
pub const EXTRACTED_TEXT_DERIVATIVE_NAME: &str = "extracted_text";

/// Content type assumed when an upload declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
