//! Extraction of a rate from a SEMP reply.

use std::fmt;
use std::sync::Arc;

use semprate_types::{QueryMode, Rate};

use crate::error::{BoxError, ParseError};
use crate::xml::Element;

/// Element holding the linked-router rates; its first two child elements are
/// the ingress and egress rates.
pub const LINKED_ROUTER_RATE_TAG: &str = "current-message-rate-messages-per-second";

/// Bridge ingress rate element.
pub const BRIDGE_INGRESS_RATE_TAG: &str = "current-ingress-rate-per-second";

/// Bridge egress rate element.
pub const BRIDGE_EGRESS_RATE_TAG: &str = "current-egress-rate-per-second";

/// Element reporting whether the router executed the request.
pub const EXECUTE_RESULT_TAG: &str = "execute-result";

type DelegateFn = dyn Fn(&str) -> Result<Rate, BoxError> + Send + Sync;

/// Caller-supplied parser for user query responses.
#[derive(Clone)]
pub struct RateDelegate(Arc<DelegateFn>);

impl RateDelegate {
    /// Wrap a closure that turns a raw response into a rate.
    pub fn new<F, R, E>(f: F) -> Self
    where
        F: Fn(&str) -> Result<R, E> + Send + Sync + 'static,
        R: Into<Rate>,
        E: Into<BoxError>,
    {
        let delegate = move |raw: &str| -> Result<Rate, BoxError> {
            f(raw).map(Into::into).map_err(Into::into)
        };
        RateDelegate(Arc::new(delegate))
    }

    pub fn call(&self, raw: &str) -> Result<Rate, BoxError> {
        (self.0)(raw)
    }
}

impl fmt::Debug for RateDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateDelegate").finish_non_exhaustive()
    }
}

/// Parse a reply produced by a query of the given mode.
///
/// User callback mode hands the raw payload to `delegate`; without one the
/// call fails with [`ParseError::Delegate`].
pub fn parse(
    mode: QueryMode,
    raw: &str,
    delegate: Option<&RateDelegate>,
) -> Result<Rate, ParseError> {
    match mode {
        QueryMode::LinkedRouterRate => parse_linked_router(raw).map(Rate::Messages),
        QueryMode::BridgeRate => parse_bridge(raw).map(Rate::Messages),
        QueryMode::UserCallback => {
            let delegate = delegate
                .ok_or_else(|| ParseError::Delegate("no rate delegate registered".to_string()))?;
            delegate
                .call(raw)
                .map_err(|e| ParseError::Delegate(e.to_string()))
        }
    }
}

/// Ingress plus egress rate of a linked-router neighbor.
pub fn parse_linked_router(raw: &str) -> Result<u64, ParseError> {
    let doc = Element::parse(raw)?;
    let rates = doc
        .find(LINKED_ROUTER_RATE_TAG)
        .ok_or_else(|| ParseError::MissingTag(LINKED_ROUTER_RATE_TAG.to_string()))?;

    let mut children = rates.children.iter();
    let ingress = children
        .next()
        .ok_or_else(|| ParseError::MissingTag(format!("{} ingress", LINKED_ROUTER_RATE_TAG)))?;
    let egress = children
        .next()
        .ok_or_else(|| ParseError::MissingTag(format!("{} egress", LINKED_ROUTER_RATE_TAG)))?;

    sum(element_value(ingress)?, element_value(egress)?)
}

/// Ingress plus egress rate of a VPN bridge.
pub fn parse_bridge(raw: &str) -> Result<u64, ParseError> {
    let doc = Element::parse(raw)?;
    let ingress = doc
        .find(BRIDGE_INGRESS_RATE_TAG)
        .ok_or_else(|| ParseError::MissingTag(BRIDGE_INGRESS_RATE_TAG.to_string()))?;
    let egress = doc
        .find(BRIDGE_EGRESS_RATE_TAG)
        .ok_or_else(|| ParseError::MissingTag(BRIDGE_EGRESS_RATE_TAG.to_string()))?;

    sum(element_value(ingress)?, element_value(egress)?)
}

fn sum(ingress: u64, egress: u64) -> Result<u64, ParseError> {
    ingress
        .checked_add(egress)
        .ok_or(ParseError::Overflow { ingress, egress })
}

/// Text of the first element named `tag`, trimmed.
///
/// Handy building block for user rate delegates.
pub fn first_element_text(raw: &str, tag: &str) -> Result<String, ParseError> {
    let doc = Element::parse(raw)?;
    doc.find(tag)
        .map(|e| e.text.trim().to_string())
        .ok_or_else(|| ParseError::MissingTag(tag.to_string()))
}

/// Outcome of a SEMP reply: `Ok` unless its `<execute-result>` carries a code
/// other than `ok`, in which case the error holds the code and any reason.
///
/// A reply without an `<execute-result>` element counts as successful.
pub fn check_execute_result(raw: &str) -> Result<(), ParseError> {
    let doc = Element::parse(raw)?;
    let Some(result) = doc.find(EXECUTE_RESULT_TAG) else {
        return Ok(());
    };

    match result.attribute("code") {
        None | Some("ok") => Ok(()),
        Some(code) => {
            let reason = result.attribute("reason").unwrap_or_default();
            Err(ParseError::Failed {
                code: code.to_string(),
                reason: reason.to_string(),
            })
        }
    }
}

fn element_value(element: &Element) -> Result<u64, ParseError> {
    leading_integer(&element.text).ok_or_else(|| ParseError::NotNumeric {
        tag: element.name.clone(),
        value: element.text.clone(),
    })
}

/// Integer prefix of a string, truncating anything after the digits.
///
/// `"12.9"` is 12, `" +7 msg"` is 7; no leading digits is `None`. Digit runs
/// beyond `u64::MAX` saturate.
fn leading_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits = s.bytes().take_while(u8::is_ascii_digit);

    let mut value: Option<u64> = None;
    for digit in digits {
        let acc = value.unwrap_or(0);
        value = Some(
            acc.saturating_mul(10)
                .saturating_add(u64::from(digit - b'0')),
        );
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mnr_reply(ingress: &str, egress: &str) -> String {
        format!(
            r#"<rpc-reply semp-version="soltr/8_7VMR">
  <rpc>
    <show>
      <cspf>
        <neighbor>
          <neighbors>
            <neighbor>
              <physical-router-name>router-b</physical-router-name>
              <stats>
                <current-message-rate-messages-per-second>
                  <ingress>{}</ingress>
                  <egress>{}</egress>
                </current-message-rate-messages-per-second>
              </stats>
            </neighbor>
          </neighbors>
        </neighbor>
      </cspf>
    </show>
  </rpc>
  <execute-result code="ok"/>
</rpc-reply>"#,
            ingress, egress
        )
    }

    fn bridge_reply(ingress: &str, egress: &str) -> String {
        format!(
            r#"<rpc-reply semp-version="soltr/8_7VMR">
  <rpc><show><bridge><bridges><bridge>
    <bridge-name>east-west</bridge-name>
    <client><stats>
      <current-ingress-rate-per-second>{}</current-ingress-rate-per-second>
      <current-egress-rate-per-second>{}</current-egress-rate-per-second>
    </stats></client>
  </bridge></bridges></bridge></show></rpc>
  <execute-result code="ok"/>
</rpc-reply>"#,
            ingress, egress
        )
    }

    #[test]
    fn linked_router_sums_ingress_and_egress() {
        assert_eq!(parse_linked_router(&mnr_reply("120", "80")), Ok(200));
    }

    #[test]
    fn linked_router_missing_rate_tag() {
        let reply = r#"<rpc-reply><rpc><show><cspf><neighbor><neighbors/></neighbor></cspf></show></rpc></rpc-reply>"#;
        assert_eq!(
            parse_linked_router(reply),
            Err(ParseError::MissingTag(LINKED_ROUTER_RATE_TAG.to_string()))
        );
    }

    #[test]
    fn linked_router_missing_ingress() {
        let reply = "<rpc-reply><current-message-rate-messages-per-second/></rpc-reply>";
        assert!(matches!(
            parse_linked_router(reply),
            Err(ParseError::MissingTag(tag)) if tag.ends_with("ingress")
        ));
    }

    #[test]
    fn bridge_sums_ingress_and_egress() {
        assert_eq!(parse_bridge(&bridge_reply("15", "27")), Ok(42));
    }

    #[test]
    fn bridge_missing_ingress_tag() {
        let reply = "<rpc-reply><current-egress-rate-per-second>5</current-egress-rate-per-second></rpc-reply>";
        assert_eq!(
            parse_bridge(reply),
            Err(ParseError::MissingTag(BRIDGE_INGRESS_RATE_TAG.to_string()))
        );
    }

    #[test]
    fn values_are_truncated_not_rounded() {
        assert_eq!(parse_bridge(&bridge_reply("10.9", "0.99")), Ok(10));
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        assert_eq!(
            parse_bridge(&bridge_reply("fast", "1")),
            Err(ParseError::NotNumeric {
                tag: BRIDGE_INGRESS_RATE_TAG.to_string(),
                value: "fast".to_string(),
            })
        );
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            parse(QueryMode::BridgeRate, "<rpc-reply><oops></rpc-reply>", None),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn parse_dispatches_on_mode() {
        assert_eq!(
            parse(QueryMode::LinkedRouterRate, &mnr_reply("1", "2"), None),
            Ok(Rate::Messages(3))
        );
        assert_eq!(
            parse(QueryMode::BridgeRate, &bridge_reply("3", "4"), None),
            Ok(Rate::Messages(7))
        );
    }

    #[test]
    fn user_mode_uses_delegate_verbatim() {
        let delegate = RateDelegate::new(|raw: &str| {
            Ok::<_, BoxError>(format!("{} bytes", raw.len()))
        });
        assert_eq!(
            parse(QueryMode::UserCallback, "<x/>", Some(&delegate)),
            Ok(Rate::Custom("4 bytes".to_string()))
        );
    }

    #[test]
    fn user_mode_delegate_error_becomes_parse_error() {
        let delegate = RateDelegate::new(|_: &str| Err::<u64, _>("no spool stats"));
        assert_eq!(
            parse(QueryMode::UserCallback, "<x/>", Some(&delegate)),
            Err(ParseError::Delegate("no spool stats".to_string()))
        );
        assert!(matches!(
            parse(QueryMode::UserCallback, "<x/>", None),
            Err(ParseError::Delegate(_))
        ));
    }

    #[test]
    fn first_element_text_trims() {
        let raw = "<rpc-reply><a><spool-usage> 17 </spool-usage></a></rpc-reply>";
        assert_eq!(first_element_text(raw, "spool-usage"), Ok("17".to_string()));
        assert!(first_element_text(raw, "nope").is_err());
    }

    #[test]
    fn sum_past_u64_max_is_an_error() {
        let max = u64::MAX.to_string();
        assert_eq!(
            parse_bridge(&bridge_reply(&max, "1")),
            Err(ParseError::Overflow {
                ingress: u64::MAX,
                egress: 1,
            })
        );
        assert_eq!(
            parse_linked_router(&mnr_reply(&max, "0")),
            Ok(u64::MAX)
        );
        assert_eq!(
            parse(QueryMode::LinkedRouterRate, &mnr_reply("1", &max), None),
            Err(ParseError::Overflow {
                ingress: 1,
                egress: u64::MAX,
            })
        );
    }

    #[test]
    fn oversized_digit_runs_saturate() {
        assert_eq!(leading_integer("99999999999999999999999"), Some(u64::MAX));
        assert_eq!(leading_integer("18446744073709551616.5"), Some(u64::MAX));
        assert_eq!(
            parse_bridge(&bridge_reply("99999999999999999999", "0")),
            Ok(u64::MAX)
        );
    }

    #[test]
    fn execute_result_codes() {
        assert_eq!(check_execute_result(&bridge_reply("1", "1")), Ok(()));
        assert_eq!(check_execute_result("<rpc-reply><router-name>a</router-name></rpc-reply>"), Ok(()));
        assert_eq!(
            check_execute_result(
                r#"<rpc-reply><execute-result code="fail" reason="Permission denied"/></rpc-reply>"#
            ),
            Err(ParseError::Failed {
                code: "fail".to_string(),
                reason: "Permission denied".to_string(),
            })
        );
        assert!(matches!(
            check_execute_result("<rpc-reply>"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn leading_integer_semantics() {
        assert_eq!(leading_integer("42"), Some(42));
        assert_eq!(leading_integer(" +7 msg"), Some(7));
        assert_eq!(leading_integer("3.99"), Some(3));
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("-5"), None);
        assert_eq!(leading_integer("abc"), None);
    }
}
