/// メニュー画像アップロードの検証とオブジェクトキー生成
use thiserror::Error;

/// ファイル名の最大長
pub const MAX_FILE_NAME_LEN: usize = 255;

/// オブジェクトキーの接頭辞
pub const KEY_PREFIX: &str = "menu-images";

/// 許可するContent-Typeと対応する拡張子
const ALLOWED_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/jpg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
];

/// ファイル名に使えない文字
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*', '\0'];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    #[error("contentType must be one of image/jpeg, image/jpg, image/png, image/gif, image/webp")]
    UnsupportedContentType,

    #[error("fileName is required")]
    MissingFileName,

    #[error("fileName must be at most 255 characters")]
    FileNameTooLong,

    #[error("fileName contains forbidden characters")]
    ForbiddenCharacters,

    #[error("fileName extension does not match contentType")]
    ExtensionMismatch,
}

/// アップロード要求を検証する
pub fn validate_upload(file_name: &str, content_type: &str) -> Result<(), UploadError> {
    let content_type = content_type.trim().to_lowercase();
    let extensions = ALLOWED_TYPES
        .iter()
        .find(|(t, _)| *t == content_type)
        .map(|(_, exts)| *exts)
        .ok_or(UploadError::UnsupportedContentType)?;

    if file_name.trim().is_empty() {
        return Err(UploadError::MissingFileName);
    }
    if file_name.chars().count() > MAX_FILE_NAME_LEN {
        return Err(UploadError::FileNameTooLong);
    }
    if file_name.contains("..")
        || file_name.chars().any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_control())
    {
        return Err(UploadError::ForbiddenCharacters);
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .ok_or(UploadError::ExtensionMismatch)?;
    if !extensions.contains(&extension.as_str()) {
        return Err(UploadError::ExtensionMismatch);
    }
    Ok(())
}

/// オブジェクトキー（`menu-images/<id>-<fileName>`、空白は`-`に置換）
pub fn object_key(unique_id: &str, file_name: &str) -> String {
    let safe_name: String = file_name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    format!("{}/{}-{}", KEY_PREFIX, unique_id, safe_name)
}

/// 公開URL（CDNがあればCDN、なければS3のバケットURL）
pub fn public_url(cdn_base_url: Option<&str>, bucket: &str, key: &str) -> String {
    match cdn_base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
    }
}
