//! The bootstrap English language profile.

use super::LanguageProfileSpec;

pub(super) fn spec() -> LanguageProfileSpec {
    LanguageProfileSpec {
        code: "en",
        name: "English",
        dialogue_quotes: vec![("\"", "\"")],
        smart_quotes: vec![("\u{201c}", "\u{201d}")],
        single_quotes: vec![("\u{2018}", "\u{2019}"), ("'", "'")],
        speaker_verbs: &[
            "said", "asked", "replied", "answered", "whispered", "shouted",
            "muttered", "exclaimed", "cried", "called", "yelled", "screamed",
            "murmured", "demanded", "pleaded", "begged", "suggested", "agreed",
            "added", "continued", "explained", "insisted", "admitted",
            "confessed", "announced", "declared", "stated", "mentioned",
            "noted", "observed", "remarked", "commented", "groaned", "sighed",
            "laughed", "chuckled", "giggled", "sobbed",
        ],
        emotion_hints: &[
            ("whispered", "whisper"),
            ("shouted", "angry"),
            ("yelled", "angry"),
            ("screamed", "fearful"),
            ("muttered", "grumpy"),
            ("exclaimed", "excited"),
            ("cried", "sad"),
            ("sobbed", "sad"),
            ("laughed", "happy"),
            ("chuckled", "happy"),
            ("giggled", "happy"),
            ("sighed", "sad"),
            ("groaned", "grumpy"),
            ("demanded", "angry"),
            ("pleaded", "sad"),
            ("begged", "sad"),
        ],
        speaker_blacklist: &[
            "he", "she", "it", "they", "we", "i", "you",
            "him", "her", "them", "us", "me",
            "his", "hers", "its", "theirs", "ours", "mine", "yours",
            "softly", "loudly", "quietly", "gruffly", "sharply", "gently",
            "slowly", "quickly", "rapidly", "carefully", "angrily", "sadly",
            "happily", "nervously", "anxiously", "fearfully", "excitedly",
            "calmly", "coldly", "warmly", "coolly", "hotly", "flatly",
            "dryly", "wryly", "sweetly", "bitterly", "harshly", "roughly",
            "smoothly", "evenly", "unevenly", "breathlessly", "hoarsely",
            "huskily", "shrilly", "deeply", "lightly", "heavily", "urgently",
            "desperately", "frantically", "hysterically", "sarcastically",
            "mockingly", "teasingly", "playfully", "seriously", "solemnly",
            "thoughtfully", "absently", "distractedly", "sleepily", "wearily",
            "tiredly", "briskly", "curtly", "abruptly", "suddenly",
            "finally", "immediately", "eventually", "meanwhile", "instead",
            "however", "therefore", "moreover", "furthermore", "nevertheless",
            "wonderfully", "terribly", "horribly", "awfully", "incredibly",
        ],
        valid_name_pattern: r"^[A-Z][a-z]{1,14}$",
        chapter_patterns: &[
            r"^(?:Chapter|CHAPTER)\s+(\d+|[IVXLCDM]+|[A-Za-z]+)(?:\s*[:\-\.]\s*(.*))?$",
            r"^(?:Part|PART)\s+(\d+|[IVXLCDM]+)(?:\s*[:\-\.]\s*(.*))?$",
            r"^(\d+)\s*[\.\:\-]\s+(.+)$",
            r"^#\s+(.+)$",
            r"^##\s+(.+)$",
        ],
        scene_break_patterns: &[
            r"^\*\s*\*\s*\*\s*$",
            r"^-\s*-\s*-\s*$",
            r"^~\s*~\s*~\s*$",
            r"^###\s*$",
        ],
    }
}
