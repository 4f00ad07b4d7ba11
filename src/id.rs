//! Structured artifact identifiers
//!
//! Every entity (charm or bundle) is named by an id of the form
//! `[~user/][series/]name[-revision]`. A missing `~user/` prefix is the
//! "promulgated form" — it names the registry-assigned public alias rather
//! than an owner's canonical id, and is only ever resolved, never stored, once
//! the resolver has looked the entity up against the source.

use crate::error::ValidationError;
use std::fmt;

/// `revision = -1` means "unspecified" throughout this crate (SPEC_FULL.md §3).
pub const UNSPECIFIED_REVISION: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
	/// Owner, empty when the id was given in promulgated form and not yet resolved.
	pub user: String,
	/// Series segment. `"bundle"` marks this id as a bundle; anything else
	/// (including the empty string) is an ordinary charm.
	pub series: String,
	pub name: String,
	pub revision: i64,
}

impl EntityId {
	/// Parse a whitelist-style id, e.g. `~charmers/bundle/fun-3` or `wordpress`.
	pub fn parse(input: &str) -> Result<Self, ValidationError> {
		let invalid = |message: &str| ValidationError::InvalidEntityId {
			input: input.to_string(),
			message: message.to_string(),
		};

		let mut rest = input;
		let user = if let Some(stripped) = rest.strip_prefix('~') {
			let (user, remainder) =
				stripped.split_once('/').ok_or_else(|| invalid("missing '/' after owner"))?;
			if user.is_empty() {
				return Err(invalid("empty owner"));
			}
			rest = remainder;
			user.to_string()
		} else {
			String::new()
		};

		let (series, name_and_rev) = match rest.split_once('/') {
			Some((series, remainder)) => (series.to_string(), remainder),
			None => (String::new(), rest),
		};

		if name_and_rev.is_empty() {
			return Err(invalid("missing entity name"));
		}

		let (name, revision) = match name_and_rev.rsplit_once('-') {
			Some((name, rev_str)) if !name.is_empty() && is_revision(rev_str) => {
				(name.to_string(), rev_str.parse().expect("validated by is_revision"))
			}
			_ => (name_and_rev.to_string(), UNSPECIFIED_REVISION),
		};

		Ok(EntityId { user, series, name, revision })
	}

	/// Whether this id is promulgated form, i.e. carries no owner yet.
	pub fn is_promulgated_form(&self) -> bool {
		self.user.is_empty()
	}

	/// Whether this id names a bundle rather than a charm.
	pub fn is_bundle(&self) -> bool {
		self.series == "bundle"
	}

	/// The base id: same owner and name, series and revision cleared.
	pub fn base_id(&self) -> EntityId {
		EntityId {
			user: self.user.clone(),
			series: String::new(),
			name: self.name.clone(),
			revision: UNSPECIFIED_REVISION,
		}
	}

	/// Stable string key for the base id, used to index `WhitelistBaseEntity` maps.
	pub fn base_id_string(&self) -> String {
		format!("~{}/{}", self.user, self.name)
	}

	/// A copy of this id with the revision cleared.
	pub fn with_revision(&self, revision: i64) -> EntityId {
		EntityId { revision, ..self.clone() }
	}
}

fn is_revision(s: &str) -> bool {
	!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for EntityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if !self.user.is_empty() {
			write!(f, "~{}/", self.user)?;
		}
		if !self.series.is_empty() {
			write!(f, "{}/", self.series)?;
		}
		write!(f, "{}", self.name)?;
		if self.revision != UNSPECIFIED_REVISION {
			write!(f, "-{}", self.revision)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_owned_revisioned_charm() {
		let id = EntityId::parse("~charmers/wordpress-4").unwrap();
		assert_eq!(id.user, "charmers");
		assert_eq!(id.series, "");
		assert_eq!(id.name, "wordpress");
		assert_eq!(id.revision, 4);
		assert!(!id.is_bundle());
	}

	#[test]
	fn parses_promulgated_revisionless() {
		let id = EntityId::parse("wordpress").unwrap();
		assert!(id.is_promulgated_form());
		assert_eq!(id.revision, UNSPECIFIED_REVISION);
	}

	#[test]
	fn parses_bundle() {
		let id = EntityId::parse("~charmers/bundle/fun-3").unwrap();
		assert!(id.is_bundle());
		assert_eq!(id.name, "fun");
		assert_eq!(id.revision, 3);
	}

	#[test]
	fn base_id_drops_series_and_revision() {
		let id = EntityId::parse("~charmers/bundle/fun-3").unwrap();
		let base = id.base_id();
		assert_eq!(base.series, "");
		assert_eq!(base.revision, UNSPECIFIED_REVISION);
		assert_eq!(base.base_id_string(), "~charmers/fun");
	}

	#[test]
	fn name_with_embedded_dash_is_not_mistaken_for_revision() {
		let id = EntityId::parse("~charmers/wordpress-fpm").unwrap();
		assert_eq!(id.name, "wordpress-fpm");
		assert_eq!(id.revision, UNSPECIFIED_REVISION);
	}

	#[test]
	fn rejects_missing_name() {
		assert!(EntityId::parse("~charmers/").is_err());
	}

	#[test]
	fn display_roundtrips() {
		let id = EntityId::parse("~charmers/bundle/fun-3").unwrap();
		assert_eq!(id.to_string(), "~charmers/bundle/fun-3");
	}
}

// vim: ts=4
