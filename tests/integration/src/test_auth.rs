//! Signature and response-decoding tests against the fake server.

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use veracode_client::{ClientError, TransportError};

    use crate::FakeVeracode;

    const APP_LIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<applist account_id="42">
  <app app_id="1" app_name="frontend"/>
  <app app_id="2" app_name="backend"/>
</applist>"#;

    #[tokio::test]
    async fn test_should_send_verifiable_signature() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("getapplist.do", APP_LIST);
        let client = server.client().unwrap();

        let apps = client.get_app_list().await.unwrap();

        let root = apps.root().unwrap();
        assert_eq!(root.attribute("account_id"), Some("42"));
        let names: Vec<_> = root
            .children("app")
            .iter()
            .filter_map(|app| app.attribute("app_name"))
            .collect();
        assert_eq!(names, vec!["frontend", "backend"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path_and_query, "/api/5.0/getapplist.do");
        assert_eq!(requests[0].verified, Ok(()));
    }

    #[tokio::test]
    async fn test_should_request_gzip_encoding() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("getapplist.do", APP_LIST);

        server.client().unwrap().get_app_list().await.unwrap();

        let accept = server.requests()[0].accept_encoding.clone().unwrap_or_default();
        assert!(accept.contains("gzip"), "accept-encoding was {accept:?}");
    }

    #[tokio::test]
    async fn test_should_sign_query_string() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("getappinfo.do", r#"<appinfo app_id="7"/>"#);
        let client = server.client().unwrap();

        let info = client
            .call("getappinfo.do?app_id=7", Method::GET, None)
            .await
            .unwrap();

        assert_eq!(info.root_name(), Some("appinfo"));
        let request = &server.requests()[0];
        assert_eq!(request.path_and_query, "/api/5.0/getappinfo.do?app_id=7");
        assert_eq!(request.verified, Ok(()));
    }

    #[tokio::test]
    async fn test_should_be_rejected_with_wrong_secret() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply("getapplist.do", APP_LIST);
        let client = server
            .client_with_secret("00000000000000000000000000000000")
            .unwrap();

        let err = client.get_app_list().await.unwrap_err();

        assert!(
            matches!(
                err,
                ClientError::Transport(TransportError::Status { status: 401, .. })
            ),
            "unexpected error: {err:?}"
        );
        assert!(server.requests()[0].verified.is_err());
    }

    #[tokio::test]
    async fn test_should_surface_embedded_api_error() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply(
            "getapplist.do",
            "<?xml version=\"1.0\"?>\n<error>Access denied.</error>",
        );

        let err = server.client().unwrap().get_app_list().await.unwrap_err();

        assert!(matches!(&err, ClientError::Api(m) if m == "Access denied."));
    }

    #[tokio::test]
    async fn test_should_fail_on_server_error_status() {
        let server = FakeVeracode::start().await.unwrap();
        server.reply_with_status("getapplist.do", StatusCode::INTERNAL_SERVER_ERROR, "boom");

        let err = server.client().unwrap().get_app_list().await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Transport(TransportError::Status { status: 500, ref body }) if body == "boom"
        ));
    }

    #[tokio::test]
    async fn test_should_distinguish_empty_and_non_xml_bodies() {
        let server = FakeVeracode::start().await.unwrap();
        let client = server.client().unwrap();

        server.reply("getapplist.do", "");
        let empty = client.get_app_list().await;
        server.reply("getapplist.do", "<html><body>maintenance");
        let broken = client.get_app_list().await;

        assert!(matches!(empty, Err(ClientError::EmptyResponse)));
        assert!(matches!(broken, Err(ClientError::Decode(_))));
    }
}
