//! Platform detection and format-selection policy

use crate::types::BEST_FORMAT;

/// Selector used for "best": best video plus best audio, else best combined
pub const DEFAULT_SELECTOR: &str = "bv*+ba/b";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Known source sites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Twitter,
    Facebook,
    Generic,
}

/// Extra tool options and default selector for one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Substrings that identify the platform in a URL
    pub markers: &'static [&'static str],
    pub extra_options: &'static [&'static str],
    /// Selector used when the caller asks for "best"
    pub format_selector: &'static str,
    /// Shown to users next to a failure
    pub tip: &'static str,
}

impl PlatformProfile {
    pub fn matches(&self, url: &str) -> bool {
        self.markers.iter().any(|m| url.contains(m))
    }

    /// Resolve the caller's format into the selector passed to the tool
    pub fn selector_for(&self, format: &str) -> String {
        if format.is_empty() || format == BEST_FORMAT {
            self.format_selector.to_string()
        } else {
            format.to_string()
        }
    }

    pub fn options(&self) -> Vec<String> {
        self.extra_options.iter().map(|s| s.to_string()).collect()
    }
}

// Order matters: first match wins.
static PROFILES: &[PlatformProfile] = &[
    PlatformProfile {
        platform: Platform::YouTube,
        markers: &["youtube.com", "youtu.be"],
        extra_options: &["--extractor-args", "youtube:player_client=web", "--no-playlist"],
        format_selector: DEFAULT_SELECTOR,
        tip: "Some YouTube videos are age-restricted, region-locked or members-only. Try another video or try again later.",
    },
    PlatformProfile {
        platform: Platform::TikTok,
        markers: &["tiktok.com"],
        extra_options: &["--user-agent", BROWSER_USER_AGENT],
        format_selector: DEFAULT_SELECTOR,
        tip: "TikTok often limits anonymous downloads. Make sure the video is public and try again in a few minutes.",
    },
    PlatformProfile {
        platform: Platform::Instagram,
        markers: &["instagram.com"],
        extra_options: &["--user-agent", BROWSER_USER_AGENT],
        format_selector: DEFAULT_SELECTOR,
        tip: "Instagram only allows downloading public posts and reels. Private accounts are not supported.",
    },
    PlatformProfile {
        platform: Platform::Twitter,
        markers: &["twitter.com", "://x.com", ".x.com"],
        extra_options: &["--user-agent", BROWSER_USER_AGENT],
        format_selector: DEFAULT_SELECTOR,
        tip: "Make sure the post contains a video and the account is not protected.",
    },
    PlatformProfile {
        platform: Platform::Facebook,
        markers: &["facebook.com", "fb.watch"],
        extra_options: &["--user-agent", BROWSER_USER_AGENT],
        format_selector: DEFAULT_SELECTOR,
        tip: "Only public Facebook videos can be downloaded. Check the video's privacy setting.",
    },
];

static GENERIC: PlatformProfile = PlatformProfile {
    platform: Platform::Generic,
    markers: &[],
    extra_options: &[],
    format_selector: DEFAULT_SELECTOR,
    tip: "Check that the link is correct and the media is publicly accessible, then try again.",
};

/// Pick the profile for a URL, falling back to the generic one
pub fn classify(url: &str) -> &'static PlatformProfile {
    PROFILES.iter().find(|p| p.matches(url)).unwrap_or(&GENERIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_platforms() {
        let cases = [
            ("https://www.youtube.com/watch?v=abc", Platform::YouTube),
            ("https://youtu.be/abc", Platform::YouTube),
            ("https://www.tiktok.com/@user/video/1", Platform::TikTok),
            ("https://www.instagram.com/reel/xyz/", Platform::Instagram),
            ("https://twitter.com/user/status/1", Platform::Twitter),
            ("https://x.com/user/status/1", Platform::Twitter),
            ("https://www.facebook.com/watch?v=1", Platform::Facebook),
            ("https://fb.watch/abc/", Platform::Facebook),
        ];
        for (url, expected) in cases {
            assert_eq!(classify(url).platform, expected, "{url}");
        }
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        assert_eq!(classify("https://vimeo.com/123").platform, Platform::Generic);
        assert_eq!(classify("https://www.netflix.com/title/1").platform, Platform::Generic);
        assert_eq!(classify("").platform, Platform::Generic);
        assert!(classify("https://example.org/a.mp4").options().is_empty());
    }

    #[test]
    fn test_first_match_wins() {
        // Mentions two platforms; YouTube comes first in the list
        let url = "https://www.facebook.com/share?u=https://youtube.com/watch?v=1";
        assert_eq!(classify(url).platform, Platform::YouTube);
    }

    #[test]
    fn test_best_normalizes_to_default_selector() {
        assert_eq!(classify("https://example.org/v").selector_for("best"), "bv*+ba/b");
        assert_eq!(classify("https://youtu.be/x").selector_for("best"), "bv*+ba/b");
        assert_eq!(classify("https://youtu.be/x").selector_for(""), "bv*+ba/b");
    }

    #[test]
    fn test_explicit_format_passes_through() {
        let profile = classify("https://www.tiktok.com/@u/video/1");
        assert_eq!(profile.selector_for("bestaudio[ext=m4a]"), "bestaudio[ext=m4a]");
        assert_eq!(profile.selector_for("18"), "18");
    }
}
