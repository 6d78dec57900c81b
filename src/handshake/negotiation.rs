//! Protocol version negotiation from a peer hello.

use crate::core::{NegotiationFailure, ProtocolVersion};
use crate::wire::HelloBody;

/// Outcome of hello negotiation.
///
/// An explicit result rather than an error: the caller pattern-matches and
/// drives the failure sequence (error message, lifecycle event, close)
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Both sides support this version; it is final for the connection.
    Agreed(ProtocolVersion),
    /// No mutually supported version exists.
    Failed(NegotiationFailure),
}

/// Compute the agreed protocol version for a peer hello.
///
/// When the hello carries a version bitmap, the bitmap wins over the header
/// version field and the highest version present on both sides is chosen —
/// newer versions are assumed to be capability supersets. Without a bitmap,
/// the peer is a legacy single-version speaker: the candidate is the lower
/// of its header version and the local maximum, and must itself be locally
/// supported.
///
/// A malformed bitmap element counts as no overlap.
pub fn negotiate(
    local: &[ProtocolVersion],
    peer_hello: &HelloBody,
    peer_header_version: u8,
) -> Negotiation {
    match peer_hello.versions() {
        Ok(Some(peer_versions)) => {
            match peer_versions
                .iter()
                .filter(|version| local.contains(version))
                .max()
            {
                Some(&version) => Negotiation::Agreed(version),
                None => Negotiation::Failed(NegotiationFailure::NoBitmapOverlap),
            }
        }
        Err(_) => Negotiation::Failed(NegotiationFailure::NoBitmapOverlap),
        Ok(None) => {
            let Some(&local_max) = local.iter().max() else {
                return Negotiation::Failed(NegotiationFailure::UnsupportedHeaderVersion(
                    peer_header_version,
                ));
            };
            let candidate = ProtocolVersion::new(peer_header_version).min(local_max);
            if local.contains(&candidate) {
                Negotiation::Agreed(candidate)
            } else {
                Negotiation::Failed(NegotiationFailure::UnsupportedHeaderVersion(
                    peer_header_version,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::HelloElement;

    const OF10: ProtocolVersion = ProtocolVersion::OF10;
    const OF13: ProtocolVersion = ProtocolVersion::OF13;

    fn bitmap_hello(versions: &[ProtocolVersion]) -> HelloBody {
        HelloBody::with_versions(versions)
    }

    #[test]
    fn test_bitmap_picks_highest_common() {
        let hello = bitmap_hello(&[OF10, ProtocolVersion::new(0x02), OF13]);
        assert_eq!(
            negotiate(&[OF10, OF13], &hello, OF13.as_u8()),
            Negotiation::Agreed(OF13)
        );
    }

    #[test]
    fn test_bitmap_without_overlap_fails() {
        let hello = bitmap_hello(&[OF10, ProtocolVersion::new(0x02)]);
        assert_eq!(
            negotiate(&[OF13], &hello, OF10.as_u8()),
            Negotiation::Failed(NegotiationFailure::NoBitmapOverlap)
        );
    }

    #[test]
    fn test_bitmap_preferred_over_header_version() {
        // Header claims 0x04 but the bitmap only offers 0x01.
        let hello = bitmap_hello(&[OF10]);
        assert_eq!(
            negotiate(&[OF10, OF13], &hello, OF13.as_u8()),
            Negotiation::Agreed(OF10)
        );
    }

    #[test]
    fn test_header_fallback_takes_lower_side() {
        let hello = HelloBody::empty();
        assert_eq!(
            negotiate(&[OF10, OF13], &hello, OF10.as_u8()),
            Negotiation::Agreed(OF10)
        );
        // Peer is newer than anything local: settle on the local maximum.
        assert_eq!(
            negotiate(&[OF10, OF13], &hello, 0x06),
            Negotiation::Agreed(OF13)
        );
    }

    #[test]
    fn test_header_fallback_unsupported_candidate_fails() {
        // min(0x02, 0x04) = 0x02, which is not locally supported.
        let hello = HelloBody::empty();
        assert_eq!(
            negotiate(&[OF10, OF13], &hello, 0x02),
            Negotiation::Failed(NegotiationFailure::UnsupportedHeaderVersion(0x02))
        );
    }

    #[test]
    fn test_malformed_bitmap_counts_as_no_overlap() {
        let hello = HelloBody {
            elements: vec![HelloElement::new(1, vec![0x00, 0x00, 0x12])],
        };
        assert_eq!(
            negotiate(&[OF10, OF13], &hello, OF13.as_u8()),
            Negotiation::Failed(NegotiationFailure::NoBitmapOverlap)
        );
    }

    #[test]
    fn test_empty_local_set_fails() {
        assert_eq!(
            negotiate(&[], &HelloBody::empty(), OF10.as_u8()),
            Negotiation::Failed(NegotiationFailure::UnsupportedHeaderVersion(0x01))
        );
    }
}
