/*
 * vSMTP mail transfer agent
 * Copyright (C) 2022 viridIT SAS
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/

/// Posting policy of a mailing list.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Category {
    /// Anyone can post, even with a null sender.
    Open,
    /// Only the senders of the locally served domains can post.
    Internal,
    /// Only the senders of the list's domain can post.
    DomainRestricted,
    /// Only the members of the list can post.
    MemberRestricted,
    /// Only the owners of the list can post.
    OwnerRestricted,
    /// Same posting rule as [`Category::Internal`].
    AnyLocal,
    /// The category marker is missing or does not name a known policy.
    Unrecognized,
}

// first match wins. `unknown` is the marker of the lists created without
// a category, they are open.
const TOKENS: [(&str, Category); 8] = [
    ("domain", Category::DomainRestricted),
    ("owner", Category::OwnerRestricted),
    ("member", Category::MemberRestricted),
    ("anylocal", Category::AnyLocal),
    ("internal", Category::Internal),
    ("open", Category::Open),
    ("public", Category::Open),
    ("unknown", Category::Open),
];

/// Trim, lowercase and drop anything that is not an ascii letter or digit.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Category {
    /// Read the category from the raw value of the marker attribute.
    #[must_use]
    pub fn classify(raw: Option<&str>) -> Self {
        let token = match raw {
            Some(raw) => sanitize(raw),
            None => return Self::Unrecognized,
        };

        TOKENS
            .iter()
            .find(|(needle, _)| token.contains(needle))
            .map_or(Self::Unrecognized, |(_, category)| *category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case::open("open", Category::Open)]
    #[case::public(" Public ", Category::Open)]
    #[case::internal("internalList", Category::Internal)]
    #[case::domain("domain-restricted", Category::DomainRestricted)]
    #[case::domain_case("DOMAIN_RESTRICTED", Category::DomainRestricted)]
    #[case::member("memberRestricted", Category::MemberRestricted)]
    #[case::owner("owner restricted", Category::OwnerRestricted)]
    #[case::any_local("any-local", Category::AnyLocal)]
    #[case::any_local_dotted("any.local", Category::AnyLocal)]
    #[case::format("format", Category::Unrecognized)]
    #[case::unknown("unknown-category", Category::Open)]
    #[case::unknown_case("UnknownCategory", Category::Open)]
    #[case::unknown_restricted("unknown-member", Category::MemberRestricted)]
    #[case::empty("", Category::Unrecognized)]
    #[case::punctuation(" ;-) ", Category::Unrecognized)]
    fn classify(#[case] raw: &str, #[case] expected: Category) {
        assert_eq!(Category::classify(Some(raw)), expected);
    }

    #[test]
    fn absent() {
        assert_eq!(Category::classify(None), Category::Unrecognized);
    }

    #[test]
    fn sanitized() {
        assert_eq!(sanitize("  Owner-Restricted!\t"), "ownerrestricted");
        assert_eq!(sanitize("éinternal"), "internal");
    }

    #[test]
    fn display() {
        assert_eq!(Category::DomainRestricted.to_string(), "domain-restricted");
        assert_eq!(
            "any-local".parse::<Category>().unwrap(),
            Category::AnyLocal
        );
        assert!("anyLocal".parse::<Category>().is_err());
    }
}
