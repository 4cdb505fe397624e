use std::{error::Error as StdError, time::Duration};

use laboratory::{SpecContext, Suite, describe, expect};
use reqwest::{Method, StatusCode};

use netctl_sdk::api::http::{
    self, ApiError, Auth, Client as SdkClient, ClientOptions, Error, Oauth2Error,
};

use super::{
    API_KEY, CLIENT_ID, CLIENT_SECRET, DEV_OK, DEV_OK_BODY, DEV_SLOW, STATE, after_all_fn,
    before_all_fn,
};
use crate::{TEST_BASE, TestState};

pub fn suite() -> Suite<TestState> {
    describe("http", |context| {
        context.it("new()", test_new);
        context.it("new_request()", test_new_req);
        context.it("new_request() with malformed base URL", test_new_req_err);
        context.it("send_request() with API key", test_send_api_key);
        context.it("send_request() without credentials", test_send_no_auth);
        context.it("send_request() with OAuth2", test_send_oauth2);
        context.it("send_request() with revoked token", test_send_oauth2_revoked);
        context.it("send_request() with wrong client", test_send_oauth2_err);
        context.it("send_request() with unreachable server", test_send_transport_err);
        context.it("send_request() with timeout", test_send_timeout);
        context.it("handle_error_response()", test_handle_err_resp);
        context.it("Error with context", test_err_context);

        context.before_all(before_all_fn).after_all(after_all_fn);
    })
}

pub fn new_client(base_url: &str, auth: Auth) -> SdkClient {
    let opts = ClientOptions {
        base_url: base_url.to_string(),
        auth,
        timeout: Some(Duration::from_secs(10)),
    };
    SdkClient::new(opts).unwrap()
}

fn oauth2_auth(secret: &str) -> Auth {
    Auth::Oauth2 {
        client_id: CLIENT_ID.to_string(),
        client_secret: secret.to_string(),
    }
}

fn dev_ok_path() -> String {
    format!("/api/v2/device/{}/routes", DEV_OK)
}

fn test_new(_: &mut SpecContext<TestState>) -> Result<(), String> {
    let opts = ClientOptions {
        base_url: format!("{}/", TEST_BASE),
        auth: Auth::None,
        timeout: None,
    };
    let client = match SdkClient::new(opts) {
        Err(e) => return Err(format!("new client error: {}", e)),
        Ok(client) => client,
    };
    expect(client.base_url()).to_equal(TEST_BASE)?;

    let client = new_client(TEST_BASE, Auth::ApiKey(API_KEY.to_string()));
    expect(client.clone().base_url()).to_equal(TEST_BASE)
}

fn test_new_req(_: &mut SpecContext<TestState>) -> Result<(), String> {
    let client = new_client(TEST_BASE, Auth::None);

    let req = match client.new_request(Method::GET, dev_ok_path().as_str(), None) {
        Err(e) => return Err(format!("new GET request error: {}", e)),
        Ok(req) => req,
    };
    expect(req.method().clone()).to_equal(Method::GET)?;
    expect(req.url().as_str()).to_equal(format!("{}{}", TEST_BASE, dev_ok_path()).as_str())?;
    expect(req.body().is_none()).to_equal(true)?;

    let body = bytes::Bytes::from_static(b"{\"routes\":[]}");
    let req = match client.new_request(Method::POST, dev_ok_path().as_str(), Some(body)) {
        Err(e) => return Err(format!("new POST request error: {}", e)),
        Ok(req) => req,
    };
    expect(req.method().clone()).to_equal(Method::POST)?;
    expect(
        req.headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )
    .to_equal(Some("application/json"))?;
    match req.body().and_then(|b| b.as_bytes()) {
        None => Err("POST request without body".to_string()),
        Some(body) => expect(body).to_equal(b"{\"routes\":[]}".as_ref()),
    }
}

fn test_new_req_err(_: &mut SpecContext<TestState>) -> Result<(), String> {
    for base_url in ["", "not a url", "http://[::1"] {
        let client = new_client(base_url, Auth::None);
        match client.new_request(Method::GET, dev_ok_path().as_str(), None) {
            Err(Error::Request(_)) => (),
            Err(e) => return Err(format!("base {:?} with unexpected error: {}", base_url, e)),
            Ok(_) => return Err(format!("base {:?} should be malformed", base_url)),
        }
    }
    Ok(())
}

fn test_send_api_key(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();

    runtime.block_on(async move {
        let client = new_client(TEST_BASE, Auth::ApiKey(API_KEY.to_string()));
        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        match client.send_request(req).await {
            Err(e) => Err(format!("send request error: {}", e)),
            Ok((status, body)) => {
                expect(status).to_equal(StatusCode::OK)?;
                expect(body.as_ref()).to_equal(DEV_OK_BODY.as_bytes())
            }
        }
    })
}

fn test_send_no_auth(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();

    runtime.block_on(async move {
        for auth in [Auth::None, Auth::ApiKey("wrong".to_string())] {
            let client = new_client(TEST_BASE, auth);
            let req = client
                .new_request(Method::GET, dev_ok_path().as_str(), None)
                .unwrap();
            match client.send_request(req).await {
                Err(e) => return Err(format!("send request error: {}", e)),
                Ok((status, _)) => expect(status).to_equal(StatusCode::UNAUTHORIZED)?,
            }
        }
        Ok(())
    })
}

fn test_send_oauth2(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();
    let mock = state.mock.as_ref().unwrap();

    runtime.block_on(async move {
        let client = new_client(TEST_BASE, oauth2_auth(CLIENT_SECRET));
        let count = mock.lock().unwrap().token_count;

        // Request twice to use in memory token.
        for _ in 0..2 {
            let req = client
                .new_request(Method::GET, dev_ok_path().as_str(), None)
                .unwrap();
            match client.send_request(req).await {
                Err(e) => return Err(format!("send request error: {}", e)),
                Ok((status, _)) => expect(status).to_equal(StatusCode::OK)?,
            }
        }
        expect(mock.lock().unwrap().token_count).to_equal(count + 1)
    })
}

fn test_send_oauth2_revoked(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();
    let mock = state.mock.as_ref().unwrap();

    runtime.block_on(async move {
        let client = new_client(TEST_BASE, oauth2_auth(CLIENT_SECRET));
        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        if let Err(e) = client.send_request(req).await {
            return Err(format!("send request error: {}", e));
        }
        let count = {
            let mut mock = mock.lock().unwrap();
            mock.tokens.clear();
            mock.token_count
        };

        // The rejected request is not sent again.
        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        match client.send_request(req).await {
            Err(e) => return Err(format!("send request with revoked token error: {}", e)),
            Ok((status, _)) => expect(status).to_equal(StatusCode::UNAUTHORIZED)?,
        }
        expect(mock.lock().unwrap().token_count).to_equal(count)?;

        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        match client.send_request(req).await {
            Err(e) => return Err(format!("send request with new token error: {}", e)),
            Ok((status, _)) => expect(status).to_equal(StatusCode::OK)?,
        }
        expect(mock.lock().unwrap().token_count).to_equal(count + 1)
    })
}

fn test_send_oauth2_err(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();

    runtime.block_on(async move {
        let client = new_client(TEST_BASE, oauth2_auth("wrong"));
        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        match client.send_request(req).await {
            Err(Error::Oauth2(e)) => expect(e).to_equal(Oauth2Error {
                error: "invalid_client".to_string(),
                error_description: Some("unknown client".to_string()),
            }),
            Err(e) => Err(format!("unexpected error: {}", e)),
            Ok(_) => Err("wrong client should be rejected".to_string()),
        }
    })
}

fn test_send_transport_err(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();

    runtime.block_on(async move {
        let client = new_client("http://127.0.0.1:1", Auth::ApiKey(API_KEY.to_string()));
        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        match client.send_request(req).await {
            Err(Error::Transport(_)) => Ok(()),
            Err(e) => Err(format!("unexpected error: {}", e)),
            Ok(_) => Err("unreachable server should fail".to_string()),
        }?;

        let client = new_client("http://127.0.0.1:1", oauth2_auth(CLIENT_SECRET));
        let req = client
            .new_request(Method::GET, dev_ok_path().as_str(), None)
            .unwrap();
        match client.send_request(req).await {
            Err(Error::Transport(_)) => Ok(()),
            Err(e) => Err(format!("unexpected token error: {}", e)),
            Ok(_) => Err("unreachable token server should fail".to_string()),
        }
    })
}

fn test_send_timeout(context: &mut SpecContext<TestState>) -> Result<(), String> {
    let state = context.state.borrow();
    let state = state.get(STATE).unwrap();
    let runtime = state.runtime.as_ref().unwrap();

    runtime.block_on(async move {
        let opts = ClientOptions {
            base_url: TEST_BASE.to_string(),
            auth: Auth::ApiKey(API_KEY.to_string()),
            timeout: Some(Duration::from_millis(200)),
        };
        let client = SdkClient::new(opts).unwrap();
        let path = format!("/api/v2/device/{}/routes", DEV_SLOW);
        let req = client.new_request(Method::GET, path.as_str(), None).unwrap();
        match client.send_request(req).await {
            Err(e) => {
                expect(matches!(e, Error::Transport(_))).to_equal(true)?;
                expect(e.is_timeout()).to_equal(true)
            }
            Ok(_) => Err("slow request should time out".to_string()),
        }
    })
}

fn test_handle_err_resp(_: &mut SpecContext<TestState>) -> Result<(), String> {
    let err = http::handle_error_response(
        StatusCode::BAD_REQUEST,
        b"{\"message\":\"device not found\",\"extra\":1}",
    );
    let expected = ApiError {
        status: 400,
        message: "device not found".to_string(),
    };
    expect(err.api_error().cloned()).to_equal(Some(expected))?;
    expect(err.to_string()).to_equal("status: 400, message: \"device not found\"".to_string())?;

    let err = http::handle_error_response(StatusCode::CREATED, b"{}");
    match err {
        Error::Api(e) => {
            expect(e.status).to_equal(201)?;
            expect(e.message.as_str()).to_equal("")?;
        }
        e => return Err(format!("unexpected error: {}", e)),
    }

    let bodies: [&[u8]; 4] = [b"<html>bad gateway</html>", b"", b"[]", b"{\"message\":1}"];
    for body in bodies {
        match http::handle_error_response(StatusCode::BAD_GATEWAY, body) {
            Error::MalformedResponse(_) => (),
            e => return Err(format!("unexpected error for {:?}: {}", body, e)),
        }
    }
    Ok(())
}

fn test_err_context(_: &mut SpecContext<TestState>) -> Result<(), String> {
    let err = http::handle_error_response(StatusCode::NOT_FOUND, b"{\"message\":\"gone\"}");
    expect(err.op()).to_equal(None)?;
    let err = err.context("inner").context("outer");
    expect(err.op()).to_equal(Some("outer"))?;
    expect(err.to_string())
        .to_equal("outer: inner: status: 404, message: \"gone\"".to_string())?;
    expect(matches!(err.root(), Error::Api(_))).to_equal(true)?;
    expect(err.api_error().map(|e| e.status)).to_equal(Some(404))?;
    expect(err.is_timeout()).to_equal(false)?;

    let source = match err.source() {
        None => return Err("context without source".to_string()),
        Some(source) => source,
    };
    expect(source.to_string()).to_equal("inner: status: 404, message: \"gone\"".to_string())?;
    match source.downcast_ref::<Error>() {
        None => Err("source is not an Error".to_string()),
        Some(inner) => expect(inner.op()).to_equal(Some("inner")),
    }
}
