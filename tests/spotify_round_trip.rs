//! Integrationstests fuer den Spotify-Namespace (Maker → XML → Parser).

use feedns::registry;
use feedns::spotify;
use feedns::{Error, MakerState, ParseOptions, Rss, RssMaker, Target, parse_rss, rss_to_xml, setup_maker};

// ============================================================================
// Hilfsfunktionen
// ============================================================================

fn feed(channel_body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:spotify="{}">
  <channel>
    <title>Show</title>
    <link>https://example.com/</link>
    {channel_body}
  </channel>
</rss>"#,
        spotify::URI
    )
}

fn parse(xml: &str) -> Rss {
    parse_rss(xml, &ParseOptions::default()).unwrap()
}

// ============================================================================
// Maker
// ============================================================================

#[test]
fn partner_and_sandbox_round_trip() {
    let mut maker = RssMaker::new();
    let access = maker.channel().extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    access.set("partner_id", "partner-7").unwrap();
    access.set("sandbox_enabled", "true").unwrap();
    let built = maker.to_feed().unwrap();

    let xml = rss_to_xml(&built).unwrap();
    assert!(xml.contains(&format!(r#"xmlns:spotify="{}""#, spotify::URI)), "{xml}");
    assert!(
        xml.contains(r#"<spotify:access><partner id="partner-7"/><sandbox enabled="true"/></spotify:access>"#),
        "{xml}"
    );

    let parsed = parse(&xml);
    assert_eq!(parsed, built);
    let access = spotify::channel_access(&parsed.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("partner-7"));
    assert_eq!(spotify::sandbox_enabled(access), Some(true));
}

#[test]
fn sandbox_only_fails_with_missing_partner_id() {
    let mut maker = RssMaker::new();
    maker
        .channel()
        .extension(spotify::EXTENSION)
        .unwrap()
        .nested("access")
        .unwrap()
        .set("sandbox_enabled", "true")
        .unwrap();

    let err = maker.to_feed().unwrap_err();
    match &err {
        Error::MissingRequiredField { path, missing } => {
            assert_eq!(path, "channel.spotify_access");
            assert_eq!(missing, &vec!["partner_id".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    let root = maker.channel().extensions().get(spotify::EXTENSION).unwrap();
    assert_eq!(root.state(), MakerState::Rejected);
}

#[test]
fn explicit_false_counts_as_set() {
    let mut maker = RssMaker::new();
    let access = maker.channel().extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    access.set("partner_id", "p").unwrap();
    access.set_value("sandbox_enabled", false).unwrap();
    let rss = maker.to_feed().unwrap();

    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::sandbox_enabled(access), Some(false));
    assert!(rss_to_xml(&rss).unwrap().contains(r#"<sandbox enabled="false"/>"#));
}

#[test]
fn absent_extension_is_not_written() {
    let mut maker = RssMaker::new();
    maker.channel().extension(spotify::EXTENSION).unwrap();
    maker.channel().new_item();
    let rss = maker.to_feed().unwrap();

    assert!(spotify::channel_access(&rss.channel).is_none());
    assert!(spotify::item_access(&rss.channel.items[0]).is_none());
    let xml = rss_to_xml(&rss).unwrap();
    assert!(!xml.contains("spotify"), "{xml}");
}

#[test]
fn repeated_commit_is_idempotent() {
    let mut maker = RssMaker::new();
    maker
        .channel()
        .extension(spotify::EXTENSION)
        .unwrap()
        .nested("access")
        .unwrap()
        .set("partner_id", "p")
        .unwrap();
    let first = maker.to_feed().unwrap();
    let second = maker.to_feed().unwrap();
    assert_eq!(first, second);
    assert_eq!(rss_to_xml(&first).unwrap(), rss_to_xml(&second).unwrap());
    let root = maker.channel().extensions().get(spotify::EXTENSION).unwrap();
    assert_eq!(root.state(), MakerState::Complete);
}

#[test]
fn item_entitlement_round_trip() {
    let mut maker = RssMaker::new();
    maker
        .channel()
        .new_item()
        .extension(spotify::EXTENSION)
        .unwrap()
        .nested("access")
        .unwrap()
        .set("entitlement_name", "premium")
        .unwrap();
    maker.channel().new_item();
    let built = maker.to_feed().unwrap();

    let parsed = parse(&rss_to_xml(&built).unwrap());
    assert_eq!(parsed, built);
    assert_eq!(parsed.channel.items.len(), 2);
    let access = spotify::item_access(&parsed.channel.items[0]).unwrap();
    assert_eq!(spotify::entitlement_name(access), Some("premium"));
    assert!(spotify::item_access(&parsed.channel.items[1]).is_none());
}

#[test]
fn surrounding_whitespace_survives_round_trip() {
    let mut maker = RssMaker::new();
    let access = maker.channel().extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    access.set("partner_id", "  p 1  ").unwrap();
    access.set("sandbox_enabled", " true ").unwrap();
    let built = maker.to_feed().unwrap();

    let parsed = parse(&rss_to_xml(&built).unwrap());
    assert_eq!(parsed, built);
    let access = spotify::channel_access(&parsed.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("  p 1  "));
    assert_eq!(spotify::sandbox_enabled(access), Some(true));
}

#[test]
fn recommit_after_clear_removes_value() {
    let mut maker = RssMaker::new();
    let access = maker.channel().extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    access.set("partner_id", "p").unwrap();
    access.set("sandbox_enabled", "true").unwrap();
    maker.to_feed().unwrap();

    let access = maker.channel().extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    access.clear("sandbox_enabled").unwrap();
    let rss = maker.to_feed().unwrap();
    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::sandbox_enabled(access), None);
    assert!(!rss_to_xml(&rss).unwrap().contains("sandbox"));
}

#[test]
fn item_schema_has_no_partner() {
    let mut maker = RssMaker::new();
    let item = maker.channel().new_item();
    let access = item.extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    assert!(matches!(access.set("partner_id", "p"), Err(Error::UnknownElement { .. })));
}

// ============================================================================
// Parser
// ============================================================================

#[test]
fn parse_reads_channel_access() {
    let rss = parse(&feed(
        r#"<spotify:access>
             <partner id="abc"/>
             <sandbox enabled="1"/>
           </spotify:access>"#,
    ));
    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("abc"));
    assert_eq!(spotify::sandbox_enabled(access), Some(true));
}

#[test]
fn parse_does_not_enforce_required_fields() {
    let rss = parse(&feed(r#"<spotify:access><sandbox enabled="false"/></spotify:access>"#));
    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::partner_id(access), None);
    assert_eq!(spotify::sandbox_enabled(access), Some(false));
}

#[test]
fn foreign_namespace_access_is_ignored() {
    let xml = r#"<rss version="2.0" xmlns:other="urn:other"><channel>
        <other:access><partner id="x"/></other:access>
        <access><partner id="y"/></access>
    </channel></rss>"#;
    let rss = parse(xml);
    assert!(spotify::channel_access(&rss.channel).is_none());
    assert!(rss.channel.extensions.is_empty());
}

#[test]
fn qualified_children_are_not_spotify_children() {
    let rss = parse(&feed(
        r#"<spotify:access><spotify:partner id="x"/><partner id="y"/></spotify:access>"#,
    ));
    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("y"));
}

#[test]
fn last_singular_occurrence_wins() {
    let rss = parse(&feed(r#"<spotify:access><partner id="a"/><partner id="b"/></spotify:access>"#));
    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("b"));
}

#[test]
fn invalid_boolean_strict_and_lenient() {
    let xml = feed(r#"<spotify:access><partner id="p"/><sandbox enabled="sometimes"/></spotify:access>"#);

    let err = parse_rss(&xml, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::TypeCoercion { .. }), "{err}");

    let rss = parse_rss(&xml, &ParseOptions::lenient()).unwrap();
    let access = spotify::channel_access(&rss.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("p"));
    assert_eq!(spotify::sandbox_enabled(access), None);
}

#[test]
fn unknown_child_strict_and_lenient() {
    let xml = feed(r#"<spotify:access><partner id="p"/><region code="de"/></spotify:access>"#);

    let rss = parse(&xml);
    assert_eq!(spotify::partner_id(spotify::channel_access(&rss.channel).unwrap()), Some("p"));

    let strict = ParseOptions::default().with_ignore_unknown_element(false);
    let err = parse_rss(&xml, &strict).unwrap_err();
    assert!(matches!(err, Error::UnknownElement { .. }), "{err}");
}

#[test]
fn setup_maker_rebuilds_and_edits_parsed_feed() {
    let parsed = parse(&feed(
        r#"<spotify:access><partner id="abc"/><sandbox enabled="true"/></spotify:access>
           <item><spotify:access><entitlement name="gold"/></spotify:access></item>
           <item><title>plain</title></item>"#,
    ));

    let mut maker = setup_maker(&parsed).unwrap();
    assert_eq!(maker.to_feed().unwrap(), parsed);

    let access = maker.channel().extension(spotify::EXTENSION).unwrap().nested("access").unwrap();
    access.set("partner_id", "xyz").unwrap();
    let edited = maker.to_feed().unwrap();
    let access = spotify::channel_access(&edited.channel).unwrap();
    assert_eq!(spotify::partner_id(access), Some("xyz"));
    assert_eq!(spotify::sandbox_enabled(access), Some(true));
    assert_eq!(edited.channel.items, parsed.channel.items);
    assert_eq!(parse(&rss_to_xml(&edited).unwrap()), edited);
}

#[test]
fn builtin_registry_has_both_targets() {
    let reg = registry::global();
    for target in [Target::Channel, Target::Item] {
        let schema = reg.lookup(spotify::EXTENSION, target).unwrap();
        assert_eq!(schema.namespace(), spotify::NAMESPACE);
        assert_eq!(schema.lookup("access").unwrap().namespace_uri(), spotify::URI);
    }
}
