//! Playlist rewriting.
//!
//! ffmpeg writes bare segment file names into the playlist. Before upload
//! every reference is replaced with the proxy path the segment was published
//! under, so players fetch segments through the application.

use std::collections::BTreeMap;

use vf_av::SegmentNaming;
use vf_core::Error;

/// Replace each segment reference in `text` with its public path.
///
/// `public_paths` maps segment index to proxy path. A reference whose index
/// is missing from the map fails with [`Error::Publish`] against
/// `manifest_key`; nothing is partially rewritten.
pub fn rewrite_manifest(
    text: &str,
    manifest_key: &str,
    public_paths: &BTreeMap<u32, String>,
) -> vf_core::Result<String> {
    let re = SegmentNaming::reference_regex();
    let mut out = String::with_capacity(text.len() + public_paths.len() * 64);
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let index = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let path = index.and_then(|i| public_paths.get(&i)).ok_or_else(|| {
            Error::publish(
                manifest_key,
                format!("playlist references unpublished segment {}", whole.as_str()),
            )
        })?;

        out.push_str(&text[last..whole.start()]);
        out.push_str(path);
        last = whole.end();
    }
    out.push_str(&text[last..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:6\n\
#EXT-X-TARGETDURATION:6\n\
#EXT-X-MEDIA-SEQUENCE:0\n\
#EXT-X-PLAYLIST-TYPE:VOD\n\
#EXT-X-INDEPENDENT-SEGMENTS\n\
#EXTINF:6.000000,\n\
chunk0.ts\n\
#EXTINF:6.000000,\n\
chunk1.ts\n\
#EXTINF:2.000000,\n\
chunk2.ts\n\
#EXT-X-ENDLIST\n";

    fn paths(n: u32) -> BTreeMap<u32, String> {
        (0..n)
            .map(|i| (i, format!("/media/uploads/bob/hls/v1/chunk{i}.ts")))
            .collect()
    }

    #[test]
    fn rewrites_every_reference() {
        let out = rewrite_manifest(PLAYLIST, "k", &paths(3)).unwrap();
        let uris: Vec<&str> = out.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(
            uris,
            vec![
                "/media/uploads/bob/hls/v1/chunk0.ts",
                "/media/uploads/bob/hls/v1/chunk1.ts",
                "/media/uploads/bob/hls/v1/chunk2.ts",
            ]
        );
    }

    #[test]
    fn tags_are_preserved() {
        let out = rewrite_manifest(PLAYLIST, "k", &paths(3)).unwrap();
        let tags_in: Vec<&str> = PLAYLIST.lines().filter(|l| l.starts_with('#')).collect();
        let tags_out: Vec<&str> = out.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(tags_in, tags_out);
        assert!(out.ends_with("#EXT-X-ENDLIST\n"));
    }

    #[test]
    fn unknown_segment_is_publish_error() {
        let err = rewrite_manifest(PLAYLIST, "uploads/bob/hls/v1/playlist.m3u8", &paths(2))
            .unwrap_err();
        match err {
            Error::Publish { key, message } => {
                assert_eq!(key, "uploads/bob/hls/v1/playlist.m3u8");
                assert!(message.contains("chunk2.ts"));
            }
            other => panic!("expected publish error, got {other}"),
        }
    }

    #[test]
    fn crlf_playlist() {
        let text = "#EXTM3U\r\n#EXTINF:6.0,\r\nchunk0.ts\r\n#EXT-X-ENDLIST\r\n";
        let out = rewrite_manifest(text, "k", &paths(1)).unwrap();
        assert_eq!(
            out,
            "#EXTM3U\r\n#EXTINF:6.0,\r\n/media/uploads/bob/hls/v1/chunk0.ts\r\n#EXT-X-ENDLIST\r\n"
        );
    }

    #[test]
    fn playlist_without_segments_is_unchanged() {
        let text = "#EXTM3U\n#EXT-X-ENDLIST\n";
        assert_eq!(rewrite_manifest(text, "k", &BTreeMap::new()).unwrap(), text);
    }
}
