//! 验证码下发通道
//!
//! 生产环境经外部短信/WhatsApp 网关 webhook 转发；未配置网关时
//! 把码打到运维日志（开发兜底），方便本地联调。

/// 验证码下发器
#[derive(Debug, Clone)]
pub enum SmsDispatcher {
    /// POST {phone, message} 到外部网关
    Webhook {
        client: reqwest::Client,
        url: String,
    },
    /// 开发兜底：码走运维可见的日志侧信道
    Dev,
}

impl SmsDispatcher {
    /// 根据配置构建；未配置 webhook 即为 Dev 模式
    pub fn from_config(webhook_url: Option<&str>) -> Self {
        match webhook_url {
            Some(url) => Self::Webhook {
                client: reqwest::Client::new(),
                url: url.to_string(),
            },
            None => {
                tracing::warn!("SMS_WEBHOOK_URL not set; verification codes will be logged");
                Self::Dev
            }
        }
    }

    /// 下发验证码
    ///
    /// 下发失败不向调用方传播 — 审计行已落库，码也已生效；
    /// 用户可以等冷却后重试。
    pub async fn dispatch(&self, phone: &str, code: &str) {
        match self {
            Self::Webhook { client, url } => {
                let body = serde_json::json!({
                    "phone": phone,
                    "message": format!("Your verification code is {code}"),
                });
                match client.post(url).json(&body).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        tracing::info!(phone = %mask_phone(phone), "Verification code dispatched");
                    }
                    Ok(resp) => {
                        tracing::error!(
                            status = %resp.status(),
                            "SMS gateway rejected verification code"
                        );
                    }
                    Err(e) => {
                        tracing::error!("SMS gateway unreachable: {}", e);
                    }
                }
            }
            Self::Dev => {
                tracing::warn!(
                    phone = %mask_phone(phone),
                    code = %code,
                    "DEV MODE verification code"
                );
            }
        }
    }
}

/// 日志里只露手机号末四位
fn mask_phone(phone: &str) -> String {
    if phone.len() <= 4 {
        return "****".to_string();
    }
    format!("****{}", &phone[phone.len() - 4..])
}
