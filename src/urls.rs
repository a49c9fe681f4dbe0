//! DingTalk URL builders
//!
//! Login redirect and in-app deep links. Pure string construction; every
//! dynamic segment is percent-escaped.

use url::form_urlencoded;

/// Open API base URL
pub const OPEN_API_BASE: &str = "https://oapi.dingtalk.com";

/// Scheme prefix of links handled by the DingTalk client
const CLIENT_BASE: &str = "dingtalk://dingtalkclient";

fn with_params(base: &str, path: &str, params: &[(&str, &str)]) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}{}?{}", base, path, query)
}

/// Build the web login URL that redirects to `callback_url` with a temp code
pub fn login_url(app_id: &str, state: &str, callback_url: &str) -> String {
    with_params(
        OPEN_API_BASE,
        "/connect/oauth2/sns_authorize",
        &[
            ("appid", app_id),
            ("response_type", "code"),
            ("scope", "snsapi_auth"),
            ("state", state),
            ("redirect_uri", callback_url),
            ("container_type", "work_platform"),
        ],
    )
}

/// Build a deep link opening `target_url` inside the workbench of an app
pub fn open_link_by_work_platform(corp_id: &str, agent_id: &str, target_url: &str) -> String {
    let app_id = format!("0_{}", agent_id);
    with_params(
        CLIENT_BASE,
        "/action/openapp",
        &[
            ("corpid", corp_id),
            ("container_type", "work_platform"),
            ("app_id", &app_id),
            ("redirect_type", "jump"),
            ("redirect_url", target_url),
        ],
    )
}

/// Build a deep link opening `target_url` in the desktop side panel
pub fn open_link_by_slide(target_url: &str) -> String {
    with_params(
        CLIENT_BASE,
        "/page/link",
        &[("url", target_url), ("pc_slide", "true")],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url() {
        let url = login_url("dingoa123", "xyz", "https://example.com/auth/callback?from=ding");
        assert_eq!(
            url,
            "https://oapi.dingtalk.com/connect/oauth2/sns_authorize?appid=dingoa123\
             &response_type=code&scope=snsapi_auth&state=xyz\
             &redirect_uri=https%3A%2F%2Fexample.com%2Fauth%2Fcallback%3Ffrom%3Dding\
             &container_type=work_platform"
        );
    }

    #[test]
    fn test_login_url_escapes_state() {
        let url = login_url("dingoa123", "a&b=c", "https://example.com");
        assert!(url.contains("state=a%26b%3Dc"));
    }

    #[test]
    fn test_open_link_by_work_platform() {
        let url = open_link_by_work_platform("ding_corp", "1000002", "https://example.com/a?b=1");
        assert_eq!(
            url,
            "dingtalk://dingtalkclient/action/openapp?corpid=ding_corp\
             &container_type=work_platform&app_id=0_1000002&redirect_type=jump\
             &redirect_url=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1"
        );
    }

    #[test]
    fn test_open_link_by_slide() {
        let url = open_link_by_slide("https://example.com/report");
        assert_eq!(
            url,
            "dingtalk://dingtalkclient/page/link?url=https%3A%2F%2Fexample.com%2Freport&pc_slide=true"
        );
    }
}
