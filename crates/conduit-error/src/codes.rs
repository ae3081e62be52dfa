// Base error codes
// Every registry starts with this table; services register their own codes on top.

use crate::coder::Coder;

// Common codes start with 1000xx
pub const SUCCESS: i64 = 100001;
pub const UNKNOWN: i64 = 100002;
pub const BIND: i64 = 100003;
pub const VALIDATION: i64 = 100004;
pub const TOKEN_INVALID: i64 = 100005;
pub const PAGE_NOT_FOUND: i64 = 100006;

// Encode/decode codes start with 1003xx
pub const ENCODING_FAILED: i64 = 100301;
pub const DECODING_FAILED: i64 = 100302;
pub const INVALID_JSON: i64 = 100303;
pub const ENCODING_JSON: i64 = 100304;
pub const DECODING_JSON: i64 = 100305;

// HTTP client codes start with 1005xx
pub const HTTP_ERROR: i64 = 100501;
pub const RESPONSE_PARSE: i64 = 100502;
pub const CLIENT_GENERATE: i64 = 100503;

// RPC client codes start with 1007xx
pub const RPC_CLIENT_GENERATE: i64 = 100701;
pub const CLIENT_CERTIFICATE: i64 = 100702;
pub const RPC_DIAL: i64 = 100703;
pub const RPC_INVOKE: i64 = 100704;
pub const RPC_RESPONSE_PARSE: i64 = 100705;
pub const CALL_STATUS_VIOLATION: i64 = 100706;

/// The coders every registry is seeded with
pub fn base_coders() -> Vec<Coder> {
    vec![
        coder(SUCCESS, 200, "Success.", "请求成功"),
        coder(UNKNOWN, 500, "Internal server error.", "服务器出错"),
        coder(
            BIND,
            400,
            "Error occurred while binding the request body to the struct.",
            "解析结构体出错",
        ),
        coder(VALIDATION, 400, "Validation failed.", "参数校验失败"),
        coder(TOKEN_INVALID, 401, "Token invalid.", "令牌无效"),
        coder(PAGE_NOT_FOUND, 404, "Page not found.", "请求路由不存在"),
        coder(
            ENCODING_FAILED,
            500,
            "Encoding failed due to an error with the data.",
            "数据编码出错",
        ),
        coder(
            DECODING_FAILED,
            500,
            "Decoding failed due to an error with the data.",
            "数据解码出错",
        ),
        coder(INVALID_JSON, 500, "Data is not valid JSON.", "数据非有效JSON结构"),
        coder(ENCODING_JSON, 500, "JSON data could not be encoded.", "JSON数据编码失败"),
        coder(DECODING_JSON, 500, "JSON data could not be decoded.", "JSON数据解码失败"),
        coder(HTTP_ERROR, 500, "HTTP request error.", "HTTP请求失败"),
        coder(
            RESPONSE_PARSE,
            500,
            "Decode data from http response error.",
            "解析HTTP服务返回数据失败",
        ),
        coder(CLIENT_GENERATE, 500, "Generate client error.", "生成客户端失败"),
        coder(RPC_CLIENT_GENERATE, 500, "Generate RPC client error.", "生成RPC客户端失败"),
        coder(CLIENT_CERTIFICATE, 500, "Validate client certificate error.", "客户端证书错误"),
        coder(RPC_DIAL, 500, "Dial to RPC server error.", "RPC客户端连接失败"),
        coder(RPC_INVOKE, 500, "Invoke RPC service function error.", "RPC客户端访问服务接口失败"),
        coder(
            RPC_RESPONSE_PARSE,
            500,
            "Decode data from RPC service error.",
            "解析RPC服务返回数据失败",
        ),
        coder(
            CALL_STATUS_VIOLATION,
            500,
            "Response does not carry a call status.",
            "返回数据缺少调用状态",
        ),
    ]
}

fn coder(code: i64, http_status: u16, en: &str, zh: &str) -> Coder {
    Coder::new(code, http_status)
        .with_message(crate::LOCALE_EN, en)
        .with_message(crate::LOCALE_ZH, zh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_base_codes_are_unique() {
        let coders = base_coders();
        let unique: HashSet<i64> = coders.iter().map(|c| c.code()).collect();
        assert_eq!(unique.len(), coders.len());
    }

    #[test]
    fn test_every_base_code_has_both_locales() {
        for coder in base_coders() {
            assert!(!coder.message(crate::LOCALE_EN).is_empty());
            assert!(!coder.message(crate::LOCALE_ZH).is_empty());
        }
    }
}
