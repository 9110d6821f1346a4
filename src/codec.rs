//! Atom/XML codec for rules.
//!
//! Decode reads the rule name from the entry's `title`. `Filter` and `Action`
//! are taken from the direct children of `RuleDescription` when the document
//! has one, so a field that happens to be named `Action` cannot shadow the
//! real element; without a `RuleDescription` the first match anywhere in the
//! document is used. Each of the three must be present; the rest of the entry
//! is ignored. Encode produces the entry body the management API expects when
//! a rule is created, and rejects field names that are not plain XML names.

use crate::error::RuleError;
use crate::filter::{Descriptor, FieldMap, RuleAction, RuleFilter};
use crate::rule::Rule;
use crate::subscription::SubscriptionRef;
use crate::xml::{self, Element};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const SERVICE_BUS_NS: &str = "http://schemas.microsoft.com/netservices/2010/10/servicebus/connect";
pub const XML_SCHEMA_INSTANCE_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const FILTER: &str = "Filter";
const ACTION: &str = "Action";
const TITLE: &str = "title";
const RULE_DESCRIPTION: &str = "RuleDescription";

// ── Decode ──────────────────────────────────────────────────────

/// Decode a rule entry fetched from the management API.
pub fn decode_rule(xml: &str, subscription: Option<SubscriptionRef>) -> Result<Rule, RuleError> {
    let root = xml::parse(xml)?;
    rule_from_element(&root, subscription)
}

/// Decode every `entry` of an Atom feed (a list-rules response).
///
/// One malformed entry fails the whole feed.
pub fn decode_feed(
    xml: &str,
    subscription: Option<SubscriptionRef>,
) -> Result<Vec<Rule>, RuleError> {
    let root = xml::parse(xml)?;
    let mut entries = Vec::new();
    root.find_all("entry", &mut entries);
    entries
        .into_iter()
        .map(|entry| rule_from_element(entry, subscription.clone()))
        .collect()
}

/// Decode the first `Filter` element of a document or fragment.
pub fn decode_filter(xml: &str) -> Result<RuleFilter, RuleError> {
    let root = xml::parse(xml)?;
    Ok(RuleFilter::from_descriptor(required_descriptor(&root, FILTER)?))
}

/// Decode the first `Action` element of a document or fragment.
pub fn decode_action(xml: &str) -> Result<RuleAction, RuleError> {
    let root = xml::parse(xml)?;
    Ok(RuleAction::from_descriptor(required_descriptor(&root, ACTION)?))
}

fn rule_from_element(
    root: &Element,
    subscription: Option<SubscriptionRef>,
) -> Result<Rule, RuleError> {
    let name = root
        .find(TITLE)
        .ok_or(RuleError::MalformedDocument { element: TITLE })?
        .text();
    let (filter, action) = match root.find(RULE_DESCRIPTION) {
        Some(description) => (
            child_descriptor(description, FILTER)?,
            child_descriptor(description, ACTION)?,
        ),
        None => (
            required_descriptor(root, FILTER)?,
            required_descriptor(root, ACTION)?,
        ),
    };
    let filter = RuleFilter::from_descriptor(filter);
    let action = RuleAction::from_descriptor(action);

    tracing::trace!(rule = %name, "decoded rule entry");

    let mut builder = Rule::builder(name).filter(filter).action(action);
    if let Some(subscription) = subscription {
        builder = builder.subscription(subscription);
    }
    Ok(builder.build())
}

fn required_descriptor(root: &Element, element: &'static str) -> Result<Descriptor, RuleError> {
    let el = root
        .find(element)
        .ok_or(RuleError::MalformedDocument { element })?;
    Ok(descriptor_from_element(el))
}

fn child_descriptor(parent: &Element, element: &'static str) -> Result<Descriptor, RuleError> {
    let el = parent
        .child_elements()
        .find(|child| child.name == element)
        .ok_or(RuleError::MalformedDocument { element })?;
    Ok(descriptor_from_element(el))
}

/// Discriminator from `type`, fields from direct children (last duplicate wins).
fn descriptor_from_element(el: &Element) -> Descriptor {
    let mut fields = FieldMap::new();
    for child in el.child_elements() {
        fields.insert(child.name.clone(), child.text());
    }
    Descriptor {
        kind: el.attribute("type").map(str::to_string),
        fields,
    }
}

// ── Encode ──────────────────────────────────────────────────────

/// Encode a filter as a standalone `<Filter i:type="..">` fragment.
pub fn encode_filter(filter: &RuleFilter) -> Result<String, RuleError> {
    encode_fragment(FILTER, &filter.to_descriptor())
}

/// Encode an action as a standalone `<Action i:type="..">` fragment.
pub fn encode_action(action: &RuleAction) -> Result<String, RuleError> {
    encode_fragment(ACTION, &action.to_descriptor())
}

/// Encode a rule as the Atom entry sent when creating it.
///
/// Filter and action elements are omitted when unset.
pub fn encode_rule(rule: &Rule) -> Result<String, RuleError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_entry(&mut writer, rule)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

/// Encode rules as an Atom feed, the shape of a list-rules response.
pub fn encode_feed(title: &str, rules: &[Rule]) -> Result<String, RuleError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(feed))?;
    write_text_element(&mut writer, TITLE, title, Some(("type", "text")))?;
    for rule in rules {
        write_entry(&mut writer, rule)?;
    }
    writer.write_event(Event::End(BytesEnd::new("feed")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn encode_fragment(element: &str, descriptor: &Descriptor) -> Result<String, RuleError> {
    let mut writer = Writer::new(Vec::new());
    write_descriptor(&mut writer, element, descriptor)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_entry<W: Write>(writer: &mut Writer<W>, rule: &Rule) -> Result<(), RuleError> {
    let mut entry = BytesStart::new("entry");
    entry.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(entry))?;
    write_text_element(writer, TITLE, rule.name(), Some(("type", "text")))?;

    let mut content = BytesStart::new("content");
    content.push_attribute(("type", "application/xml"));
    writer.write_event(Event::Start(content))?;

    let mut description = BytesStart::new("RuleDescription");
    description.push_attribute(("xmlns:i", XML_SCHEMA_INSTANCE_NS));
    description.push_attribute(("xmlns", SERVICE_BUS_NS));
    writer.write_event(Event::Start(description))?;
    if let Some(filter) = rule.filter() {
        write_descriptor(writer, FILTER, &filter.to_descriptor())?;
    }
    if let Some(action) = rule.action() {
        write_descriptor(writer, ACTION, &action.to_descriptor())?;
    }
    writer.write_event(Event::End(BytesEnd::new("RuleDescription")))?;

    writer.write_event(Event::End(BytesEnd::new("content")))?;
    writer.write_event(Event::End(BytesEnd::new("entry")))?;
    Ok(())
}

fn write_descriptor<W: Write>(
    writer: &mut Writer<W>,
    element: &str,
    descriptor: &Descriptor,
) -> Result<(), RuleError> {
    let mut start = BytesStart::new(element);
    if let Some(kind) = &descriptor.kind {
        start.push_attribute(("i:type", kind.as_str()));
    }
    if descriptor.fields.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for (name, value) in &descriptor.fields {
        check_field_name(name)?;
        write_text_element(writer, name, value, None)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element)))?;
    Ok(())
}

/// Field names become element names: they must be XML names without a
/// namespace prefix, since decode keys fields by local name.
fn check_field_name(name: &str) -> Result<(), RuleError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RuleError::InvalidRule(format!("invalid field name '{name}'")))
    }
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
    attribute: Option<(&str, &str)>,
) -> Result<(), RuleError> {
    let mut start = BytesStart::new(name);
    if let Some(attr) = attribute {
        start.push_attribute(attr);
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SqlExpression;

    const ENTRY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xmlns="http://www.w3.org/2005/Atom">
  <id>https://ns.servicebus.windows.net/orders/subscriptions/audit/rules/OrdersRule</id>
  <title type="text">OrdersRule</title>
  <updated>2012-08-14T10:00:00Z</updated>
  <content type="application/xml">
    <RuleDescription xmlns:i="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect">
      <Filter i:type="SqlFilterExpression"><SqlExpression>MyProperty='XYZ'</SqlExpression></Filter>
      <Action i:type="SqlFilterAction"><SqlExpression>set MyProperty2 = 'ABC'</SqlExpression></Action>
    </RuleDescription>
  </content>
</entry>"#;

    #[test]
    fn decodes_name_filter_and_action() {
        let sub = SubscriptionRef::new("orders", "audit");
        let rule = decode_rule(ENTRY, Some(sub.clone())).unwrap();

        assert_eq!(rule.name(), "OrdersRule");
        assert_eq!(rule.subscription(), Some(&sub));
        assert_eq!(
            rule.filter(),
            Some(&RuleFilter::Raw(
                Descriptor::new("SqlFilterExpression").with_field("SqlExpression", "MyProperty='XYZ'")
            ))
        );
        assert_eq!(
            rule.action(),
            Some(&RuleAction::Raw(
                Descriptor::new("SqlFilterAction")
                    .with_field("SqlExpression", "set MyProperty2 = 'ABC'")
            ))
        );
    }

    #[test]
    fn missing_action_is_fatal() {
        let xml = ENTRY.replace(
            r#"<Action i:type="SqlFilterAction"><SqlExpression>set MyProperty2 = 'ABC'</SqlExpression></Action>"#,
            "",
        );
        let err = decode_rule(&xml, None).unwrap_err();
        assert!(matches!(err, RuleError::MalformedDocument { element: "Action" }));
    }

    #[test]
    fn missing_title_is_fatal() {
        let xml = ENTRY.replace(r#"<title type="text">OrdersRule</title>"#, "");
        let err = decode_rule(&xml, None).unwrap_err();
        assert!(matches!(err, RuleError::MalformedDocument { element: "title" }));
    }

    #[test]
    fn missing_filter_is_fatal() {
        let err = decode_rule("<entry><title>r</title><Action/></entry>", None).unwrap_err();
        assert!(matches!(err, RuleError::MalformedDocument { element: "Filter" }));
    }

    #[test]
    fn duplicate_children_last_wins() {
        let filter = decode_filter(r#"<Filter i:type="X"><A>1</A><A>2</A></Filter>"#).unwrap();
        assert_eq!(
            filter,
            RuleFilter::Raw(Descriptor::new("X").with_field("A", "2"))
        );
    }

    #[test]
    fn missing_type_attribute_is_tolerated() {
        let action = decode_action("<Action><A>1</A></Action>").unwrap();
        let RuleAction::Raw(d) = action else {
            panic!("expected raw action, got {action:?}");
        };
        assert_eq!(d.kind, None);
        assert_eq!(d.fields["A"], "1");
    }

    #[test]
    fn typed_filter_decodes_from_wire() {
        let filter = decode_filter(
            r#"<Filter xmlns:i="x" i:type="SqlFilter"><SqlExpression>a &gt; 1</SqlExpression><CompatibilityLevel>20</CompatibilityLevel></Filter>"#,
        )
        .unwrap();
        assert_eq!(
            filter,
            RuleFilter::Sql(SqlExpression {
                expression: Some("a > 1".into()),
                compatibility_level: Some("20".into()),
            })
        );
    }

    #[test]
    fn encode_filter_shape() {
        let xml = encode_filter(&RuleFilter::sql("MyProperty = 1")).unwrap();
        assert_eq!(
            xml,
            r#"<Filter i:type="SqlFilter"><SqlExpression>MyProperty = 1</SqlExpression></Filter>"#
        );
        assert_eq!(
            encode_action(&RuleAction::Empty).unwrap(),
            r#"<Action i:type="EmptyRuleAction"/>"#
        );
    }

    #[test]
    fn fragments_round_trip() {
        let filters = [
            RuleFilter::sql("Color = 'red' AND Size > 3"),
            RuleFilter::match_all(),
            RuleFilter::correlation("order-42"),
            RuleFilter::Raw(Descriptor::new("SqlFilterExpression").with_field("SqlExpression", "a<b & c")),
            RuleFilter::Raw(Descriptor {
                kind: None,
                fields: FieldMap::from([("Empty".to_string(), String::new())]),
            }),
        ];
        for filter in filters {
            let xml = encode_filter(&filter).unwrap();
            assert_eq!(decode_filter(&xml).unwrap(), filter, "{xml}");
        }

        for action in [RuleAction::sql("set X = 1"), RuleAction::Empty] {
            let xml = encode_action(&action).unwrap();
            assert_eq!(decode_action(&xml).unwrap(), action, "{xml}");
        }
    }

    #[test]
    fn rule_entry_round_trips() {
        let sub = SubscriptionRef::new("orders", "audit");
        let rule = Rule::builder("OrdersRule")
            .subscription(sub.clone())
            .filter(RuleFilter::sql("MyProperty='XYZ'"))
            .action(RuleAction::sql("set MyProperty2 = 'ABC'"))
            .build();

        let xml = encode_rule(&rule).unwrap();
        assert!(xml.contains(SERVICE_BUS_NS));
        assert_eq!(decode_rule(&xml, Some(sub)).unwrap(), rule);
    }

    #[test]
    fn rule_without_filter_omits_element() {
        let xml = encode_rule(&Rule::new("bare")).unwrap();
        assert!(!xml.contains("<Filter"));
        assert!(matches!(
            decode_rule(&xml, None),
            Err(RuleError::MalformedDocument { element: "Filter" })
        ));
    }

    #[test]
    fn encode_rejects_invalid_field_names() {
        for name in ["a b", "ns:Field", "1st", "", "a<b"] {
            let filter = RuleFilter::Raw(Descriptor::new("X").with_field(name, "v"));
            let err = encode_filter(&filter).unwrap_err();
            assert!(matches!(err, RuleError::InvalidRule(_)), "{name}: {err}");
        }

        let action = RuleAction::Raw(Descriptor::new("X").with_field("ns:Field", "v"));
        assert!(encode_action(&action).is_err());

        let rule = Rule::builder("r")
            .filter(RuleFilter::Raw(Descriptor::new("X").with_field("a b", "v")))
            .action(RuleAction::Empty)
            .build();
        assert!(matches!(encode_rule(&rule), Err(RuleError::InvalidRule(_))));
    }

    #[test]
    fn accepts_plain_xml_field_names() {
        let filter = RuleFilter::Raw(
            Descriptor::new("X")
                .with_field("_private", "1")
                .with_field("Field-2.b", "2")
                .with_field("Größe", "3"),
        );
        let xml = encode_filter(&filter).unwrap();
        assert_eq!(decode_filter(&xml).unwrap(), filter);
    }

    #[test]
    fn field_named_action_does_not_shadow_action() {
        let rule = Rule::builder("Shadow")
            .filter(RuleFilter::Raw(
                Descriptor::new("FutureFilter")
                    .with_field("Action", "forward")
                    .with_field("Filter", "nested"),
            ))
            .action(RuleAction::sql("set X = 1"))
            .build();
        let xml = encode_rule(&rule).unwrap();
        assert_eq!(decode_rule(&xml, None).unwrap(), rule);
    }

    #[test]
    fn rule_description_without_action_is_fatal() {
        let xml = r#"<entry><title>r</title><RuleDescription><Filter i:type="X"><Action>a</Action></Filter></RuleDescription></entry>"#;
        assert!(matches!(
            decode_rule(xml, None),
            Err(RuleError::MalformedDocument { element: "Action" })
        ));
    }

    #[test]
    fn feed_decodes_every_entry() {
        let rules = vec![
            Rule::builder("a")
                .filter(RuleFilter::match_all())
                .action(RuleAction::Empty)
                .build(),
            Rule::builder("b")
                .filter(RuleFilter::correlation("c1"))
                .action(RuleAction::sql("set X = 1"))
                .build(),
        ];
        let xml = encode_feed("rules", &rules).unwrap();
        assert_eq!(decode_feed(&xml, None).unwrap(), rules);
    }

    #[test]
    fn feed_with_bad_entry_fails() {
        let xml = r#"<feed><entry><title>a</title><Filter/><Action/></entry><entry><title>b</title></entry></feed>"#;
        assert!(decode_feed(xml, None).is_err());
    }
}
