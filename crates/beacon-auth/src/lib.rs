use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 管理会话 cookie 名称
pub const SESSION_COOKIE: &str = "bcn_session";

/// 认证错误类型
#[derive(Error, Debug)]
pub enum AuthError {
    /// 未配置管理口令，登录不可用
    #[error("admin login not configured")]
    NotConfigured,

    /// 用户名或口令不匹配
    #[error("invalid credentials")]
    InvalidCredentials,

    /// 凭证签发失败
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// 会话凭证载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户
    pub sub: String,
    /// 过期时间（unix 秒）
    pub exp: i64,
    /// 签发时间
    pub iat: i64,
}

/// 会话/令牌签发与校验
///
/// 两条独立路径授予完整视图：有效的管理会话凭证，或静态面板令牌
/// 精确匹配。未配置面板令牌时默认对所有访问者放开完整视图（有意
/// 的 fail-open，见配置文档），服务端不保存会话表——凭证自带过期
/// 即唯一的失效机制。
pub struct SessionAuth {
    secret: String,
    ttl_sec: i64,
    admin_user: String,
    admin_pass: Option<String>,
    dashboard_token: Option<String>,
}

impl SessionAuth {
    pub fn new(
        secret: String,
        ttl_sec: i64,
        admin_user: String,
        admin_pass: Option<String>,
        dashboard_token: Option<String>,
    ) -> Self {
        // 空串视为未配置
        let admin_pass = admin_pass.filter(|s| !s.is_empty());
        let dashboard_token = dashboard_token.filter(|s| !s.is_empty());
        Self {
            secret,
            ttl_sec,
            admin_user,
            admin_pass,
            dashboard_token,
        }
    }

    pub fn admin_user(&self) -> &str {
        &self.admin_user
    }

    pub fn session_ttl_sec(&self) -> i64 {
        self.ttl_sec
    }

    /// 是否配置了静态面板令牌
    pub fn token_required(&self) -> bool {
        self.dashboard_token.is_some()
    }

    /// 校验登录并签发新凭证
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let expected = self
            .admin_pass
            .as_deref()
            .ok_or(AuthError::NotConfigured)?;
        if username != self.admin_user || password != expected {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue(&self.admin_user)
    }

    /// 签发会话凭证
    pub fn issue(&self, user: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.to_string(),
            exp: now + self.ttl_sec,
            iat: now,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// 校验会话凭证
    ///
    /// 签名不符、载荷不可解或已过期一律返回 None。
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .ok()
    }

    /// 判定是否授予完整（未脱敏）视图
    ///
    /// 管理会话有效，或提交的令牌与配置精确匹配；未配置令牌时默认放开。
    pub fn is_full_view(&self, has_admin_session: bool, provided_token: Option<&str>) -> bool {
        if has_admin_session {
            return true;
        }
        match &self.dashboard_token {
            None => true,
            Some(expected) => provided_token == Some(expected.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_with(pass: Option<&str>, token: Option<&str>) -> SessionAuth {
        SessionAuth::new(
            "test-secret".to_string(),
            3600,
            "admin".to_string(),
            pass.map(|s| s.to_string()),
            token.map(|s| s.to_string()),
        )
    }

    #[test]
    fn test_issue_and_verify() {
        let auth = auth_with(Some("secret"), None);
        let token = auth.issue("admin").unwrap();
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let auth = auth_with(Some("secret"), None);
        let token = auth.issue("admin").unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(auth.verify(&tampered).is_none());
        assert!(auth.verify("not-a-token").is_none());

        // 其他密钥签发的凭证不被接受
        let other = auth_with(Some("secret"), None);
        let foreign = SessionAuth::new(
            "other-secret".to_string(),
            3600,
            "admin".to_string(),
            None,
            None,
        )
        .issue("admin")
        .unwrap();
        assert!(other.verify(&foreign).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = SessionAuth::new(
            "test-secret".to_string(),
            -10,
            "admin".to_string(),
            None,
            None,
        );
        let token = auth.issue("admin").unwrap();
        assert!(auth.verify(&token).is_none());
    }

    #[test]
    fn test_login_paths() {
        let auth = auth_with(Some("hunter2"), None);
        assert!(auth.login("admin", "hunter2").is_ok());
        assert!(matches!(
            auth.login("admin", "wrong").unwrap_err(),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            auth.login("other", "hunter2").unwrap_err(),
            AuthError::InvalidCredentials
        ));

        let unconfigured = auth_with(None, None);
        assert!(matches!(
            unconfigured.login("admin", "x").unwrap_err(),
            AuthError::NotConfigured
        ));

        // 空口令同样视为未配置
        let empty = auth_with(Some(""), None);
        assert!(matches!(
            empty.login("admin", "").unwrap_err(),
            AuthError::NotConfigured
        ));
    }

    #[test]
    fn test_fail_open_when_no_dashboard_token() {
        // 未配置面板令牌：默认对所有访问者放开完整视图（文档化行为）
        let auth = auth_with(None, None);
        assert!(!auth.token_required());
        assert!(auth.is_full_view(false, None));
        assert!(auth.is_full_view(false, Some("anything")));
    }

    #[test]
    fn test_token_gated_view() {
        let auth = auth_with(None, Some("viewkey"));
        assert!(auth.token_required());
        assert!(!auth.is_full_view(false, None));
        assert!(!auth.is_full_view(false, Some("wrong")));
        assert!(auth.is_full_view(false, Some("viewkey")));
        // 管理会话独立放行
        assert!(auth.is_full_view(true, None));
    }
}
