//! Per-requester cooldown book.
//!
//! A request is admitted by reserving the requester's slot up front: the new
//! timestamp is written immediately, so a second concurrent request from the
//! same requester is rejected while the first is still in flight. The
//! returned [`CooldownGuard`] restores the previous timestamp unless the
//! grant is committed, so only successful transfers consume the cooldown.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Time left before a requester may be funded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingWait(pub Duration);

impl fmt::Display for RemainingWait {
    /// Rounded to the nearest second, minute or hour depending on magnitude.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0.num_milliseconds().max(0);
        let round = |unit: i64| (ms + unit / 2) / unit;

        if ms < MS_PER_MINUTE {
            write!(f, "{} second(s)", round(MS_PER_SECOND))
        } else if ms < MS_PER_HOUR {
            write!(f, "{} minute(s)", round(MS_PER_MINUTE))
        } else {
            write!(f, "{} hour(s)", round(MS_PER_HOUR))
        }
    }
}

#[derive(Debug)]
struct Reservation {
    requester: String,
    reserved_at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
}

/// Last successful grant per requester. Records are never evicted.
#[derive(Debug)]
pub struct CooldownBook {
    interval: Duration,
    exempt: HashSet<String>,
    last_grant: DashMap<String, DateTime<Utc>>,
}

impl CooldownBook {
    pub fn new(interval: Duration, exempt: impl IntoIterator<Item = String>) -> Self {
        Self {
            interval,
            exempt: exempt.into_iter().collect(),
            last_grant: DashMap::new(),
        }
    }

    pub fn is_exempt(&self, requester: &str) -> bool {
        self.exempt.contains(requester)
    }

    /// Check the cooldown and, if it has elapsed, record `now` as the
    /// requester's last grant. Exempt requesters are neither checked nor
    /// recorded.
    pub fn try_reserve(&self, requester: &str, now: DateTime<Utc>) -> Result<CooldownGuard<'_>, RemainingWait> {
        if self.is_exempt(requester) {
            return Ok(CooldownGuard {
                book: self,
                reservation: None,
            });
        }

        let previous = match self.last_grant.entry(requester.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let last = *occupied.get();
                let available_at = last + self.interval;
                if now < available_at {
                    return Err(RemainingWait(available_at - now));
                }
                occupied.insert(now);
                Some(last)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                None
            }
        };

        Ok(CooldownGuard {
            book: self,
            reservation: Some(Reservation {
                requester: requester.to_owned(),
                reserved_at: now,
                previous,
            }),
        })
    }

    pub fn last_grant(&self, requester: &str) -> Option<DateTime<Utc>> {
        self.last_grant.get(requester).map(|entry| *entry.value())
    }

    /// Number of requesters with a recorded grant.
    pub fn len(&self) -> usize {
        self.last_grant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_grant.is_empty()
    }

    fn restore(&self, reservation: Reservation) {
        if let Entry::Occupied(mut occupied) = self.last_grant.entry(reservation.requester) {
            // A newer reservation owns the record now.
            if *occupied.get() != reservation.reserved_at {
                return;
            }
            match reservation.previous {
                Some(previous) => {
                    occupied.insert(previous);
                }
                None => {
                    occupied.remove();
                }
            }
            debug!("Rolled back cooldown reservation");
        }
    }
}

/// Pending cooldown reservation. Dropping it without [`commit`](Self::commit)
/// restores the requester's previous timestamp.
#[must_use = "dropping the guard rolls the reservation back"]
#[derive(Debug)]
pub struct CooldownGuard<'a> {
    book: &'a CooldownBook,
    reservation: Option<Reservation>,
}

impl CooldownGuard<'_> {
    /// True when the requester bypassed the cooldown.
    pub fn is_exempt(&self) -> bool {
        self.reservation.is_none()
    }

    /// Keep the reserved timestamp.
    pub fn commit(mut self) {
        self.reservation = None;
    }

    /// Restore the previous timestamp now.
    pub fn rollback(mut self) {
        if let Some(reservation) = self.reservation.take() {
            self.book.restore(reservation);
        }
    }
}

impl Drop for CooldownGuard<'_> {
    fn drop(&mut self) {
        if let Some(reservation) = self.reservation.take() {
            self.book.restore(reservation);
        }
    }
}
