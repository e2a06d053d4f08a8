//! Upload workflow tests against the fake server.

#[cfg(test)]
mod tests {
    use std::fs;

    use http::Method;
    use veracode_archive::ArchiveBuilder;
    use veracode_client::{ClientError, UploadDirectoryRequest, UploadFileRequest};

    use crate::FakeVeracode;

    const FILELIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<filelist account_id="42" app_id="123" build_id="900">
  <file file_id="1" file_name="app.zip" file_status="Uploaded"/>
</filelist>"#;

    #[tokio::test]
    async fn test_should_upload_file_as_multipart() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("uploadfile.do", FILELIST);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.zip");
        fs::write(&path, b"payload-bytes").unwrap();

        let filelist = server
            .client()
            .unwrap()
            .upload_file(UploadFileRequest::new("123", &path))
            .await
            .unwrap();

        assert_eq!(filelist.attribute("build_id"), Some("900"));
        assert_eq!(filelist.children("file").len(), 1);

        let request = &server.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.verified, Ok(()));
        assert!(
            request
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("multipart/form-data"))
        );
        assert_eq!(request.form_text("app_id").as_deref(), Some("123"));
        assert_eq!(request.form_text("sandbox_id"), None);
        assert_eq!(request.form_text("save_as"), None);
        assert!(request.body_text().contains("filename=\"app.zip\""));
        assert!(request.body_contains(b"payload-bytes"));
    }

    #[tokio::test]
    async fn test_should_send_sandbox_and_save_as() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("uploadfile.do", FILELIST);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.zip");
        fs::write(&path, b"x").unwrap();

        server
            .client()
            .unwrap()
            .upload_file(
                UploadFileRequest::new("123", &path)
                    .with_sandbox_id("55")
                    .with_save_as("release.zip"),
            )
            .await
            .unwrap();

        let request = &server.requests()[0];
        assert_eq!(request.form_text("sandbox_id").as_deref(), Some("55"));
        assert_eq!(request.form_text("save_as").as_deref(), Some("release.zip"));
    }

    #[tokio::test]
    async fn test_should_reject_upload_response_without_files() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("uploadfile.do", r#"<filelist app_id="123"></filelist>"#);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.zip");
        fs::write(&path, b"x").unwrap();

        let err = server
            .client()
            .unwrap()
            .upload_file(UploadFileRequest::new("123", &path))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_should_not_contact_server_for_missing_file() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("uploadfile.do", FILELIST);

        let err = server
            .client()
            .unwrap()
            .upload_file(UploadFileRequest::new("123", "/no/such/app.zip"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Io { .. }));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_archive_and_upload_directory() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("uploadfile.do", FILELIST);

        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("lib")).unwrap();
        fs::create_dir_all(src.path().join("node_modules/left-pad")).unwrap();
        fs::write(src.path().join("index.js"), b"require('./lib/util')").unwrap();
        fs::write(src.path().join("lib/util.js"), b"module.exports = {}").unwrap();
        fs::write(src.path().join("node_modules/left-pad/index.js"), b"pad").unwrap();
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("bundle.zip");

        let client = server
            .client()
            .unwrap()
            .with_archiver(ArchiveBuilder::new().with_output_path(&archive));

        let filelist = client
            .upload_directory(
                UploadDirectoryRequest::new("123", src.path(), "**/*.js")
                    .with_exclude_pattern("node_modules/**")
                    .with_sandbox_id("55"),
            )
            .await
            .unwrap();

        assert_eq!(filelist.children("file").len(), 1);
        assert!(!archive.exists(), "temporary archive should be removed");

        let request = &server.requests()[0];
        assert_eq!(request.verified, Ok(()));
        assert_eq!(request.form_text("sandbox_id").as_deref(), Some("55"));
        assert!(request.body_text().contains("filename=\"bundle.zip\""));
        assert!(request.body_contains(b"PK\x03\x04"));
        assert!(request.body_contains(b"lib/util.js"));
        assert!(!request.body_contains(b"node_modules/left-pad/index.js"));
    }

    #[tokio::test]
    async fn test_should_begin_prescan() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply(
            "beginprescan.do",
            r#"<buildinfo app_id="123" build_id="900"><build version="v1"/></buildinfo>"#,
        );

        let info = server
            .client()
            .unwrap()
            .begin_prescan("123", None, true)
            .await
            .unwrap();

        assert_eq!(info.root().unwrap().attribute("build_id"), Some("900"));
        let request = &server.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.verified, Ok(()));
        assert_eq!(request.form_text("auto_scan").as_deref(), Some("true"));
        assert_eq!(request.form_text("sandbox_id"), None);
    }
}
