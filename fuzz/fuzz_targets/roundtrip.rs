#![no_main]
use libfuzzer_sys::fuzz_target;

// Was der Parser liefert, muss Serialisierung + erneutes Parsen ueberstehen.
fuzz_target!(|data: &[u8]| {
    if let Ok(xml) = std::str::from_utf8(data) {
        let opts = feedns::ParseOptions::default();
        if let Ok(rss) = feedns::parse_rss(xml, &opts) {
            let out = feedns::rss_to_xml(&rss).expect("serialize parsed feed");
            let again = feedns::parse_rss(&out, &opts).expect("reparse serialized feed");
            assert_eq!(rss.channel, again.channel);
        }
    }
});
