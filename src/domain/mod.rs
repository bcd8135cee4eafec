use std::collections::HashSet;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A scheduled class and its seat accounting.
///
/// The membership lists are private so every mutation goes through a
/// transition method that upholds the capacity and uniqueness invariants.
/// Counts are derived from the lists rather than stored next to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Class {
    /// Unique identifier for the `Class`
    ///
    /// Minted by the scheduling workflow that creates the class; the core
    /// never creates or deletes classes.
    pub class_id: Uuid,
    /// Display name, e.g. "Tuesday Vinyasa".
    pub name: String,
    /// Scheduled start of the session.
    pub starts_at: DateTime<Utc>,
    max_capacity: NonZeroU32,
    wait_list_capacity: u32,
    /// Members holding a confirmed seat, in enrollment order.
    enrolled: Vec<Uuid>,
    /// Members waiting for a seat, in join order. The head is promoted
    /// first.
    waitlisted: Vec<Uuid>,
    attendance_taken: bool,
}

impl Class {
    /// A new class starts with empty membership.
    pub fn new(
        class_id: Uuid,
        name: String,
        starts_at: DateTime<Utc>,
        max_capacity: NonZeroU32,
        wait_list_capacity: u32,
    ) -> Self {
        Self {
            class_id,
            name,
            starts_at,
            max_capacity,
            wait_list_capacity,
            enrolled: Vec::new(),
            waitlisted: Vec::new(),
            attendance_taken: false,
        }
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity.get()
    }

    pub fn wait_list_capacity(&self) -> u32 {
        self.wait_list_capacity
    }

    /// Members holding a confirmed seat, in enrollment order.
    pub fn enrolled(&self) -> &[Uuid] {
        &self.enrolled
    }

    /// Members waiting for a seat, in join order.
    pub fn waitlisted(&self) -> &[Uuid] {
        &self.waitlisted
    }

    /// Whether attendance has been recorded. Once true the class has
    /// occurred and its bookings are frozen.
    pub fn attendance_taken(&self) -> bool {
        self.attendance_taken
    }

    /// Number of confirmed seats taken, derived from the membership list.
    pub fn enrolled_count(&self) -> usize {
        self.enrolled.len()
    }

    /// Number of waitlist slots taken, derived from the queue.
    pub fn waitlisted_count(&self) -> usize {
        self.waitlisted.len()
    }

    /// Where the member currently stands in this class, if anywhere.
    pub fn placement_of(&self, member_id: Uuid) -> Option<Placement> {
        if self.enrolled.contains(&member_id) {
            Some(Placement::Enrolled)
        } else if self.waitlisted.contains(&member_id) {
            Some(Placement::Waitlisted)
        } else {
            None
        }
    }

    /// 0-based queue position, if the member is waitlisted.
    pub fn wait_list_position(&self, member_id: Uuid) -> Option<usize> {
        self.waitlisted.iter().position(|id| *id == member_id)
    }

    /// Admits a member: a confirmed seat while one is open, the waitlist
    /// tail once seats are gone, a rejection once both are full.
    ///
    /// The capacity check and the membership append are one transition, so
    /// the decision can never be applied against counts that no longer
    /// hold.
    pub fn admit(&mut self, member_id: Uuid) -> Result<Placement, BookingError> {
        if self.attendance_taken {
            return Err(BookingError::AttendanceAlreadyTaken(self.class_id));
        }
        if self.placement_of(member_id).is_some() {
            return Err(BookingError::AlreadyRegistered(member_id));
        }

        if self.enrolled.len() < self.max_capacity.get() as usize {
            self.enrolled.push(member_id);
            Ok(Placement::Enrolled)
        } else if self.waitlisted.len() < self.wait_list_capacity as usize {
            self.waitlisted.push(member_id);
            Ok(Placement::Waitlisted)
        } else {
            Err(BookingError::CapacityExceeded(self.class_id))
        }
    }

    /// Removes a member from whichever list holds them.
    ///
    /// Freeing a confirmed seat promotes the waitlist head into it within
    /// the same transition; a freed seat with a non-empty waitlist cannot
    /// skip promotion. Leaving the waitlist promotes nobody.
    pub fn withdraw(&mut self, member_id: Uuid) -> Result<Withdrawal, BookingError> {
        if self.attendance_taken {
            return Err(BookingError::AttendanceAlreadyTaken(self.class_id));
        }

        if let Some(seat) = self.enrolled.iter().position(|id| *id == member_id) {
            self.enrolled.remove(seat);
            let promoted = if self.waitlisted.is_empty() {
                None
            } else {
                let next = self.waitlisted.remove(0);
                self.enrolled.push(next);
                Some(next)
            };
            Ok(Withdrawal::Seat { promoted })
        } else if let Some(slot) = self.waitlisted.iter().position(|id| *id == member_id) {
            self.waitlisted.remove(slot);
            Ok(Withdrawal::WaitList)
        } else {
            Err(BookingError::NotRegistered(member_id))
        }
    }

    /// Marks the class as held. Valid exactly once; the enrollment roster
    /// stays in place as history.
    pub fn mark_attendance_taken(&mut self) -> Result<(), BookingError> {
        if self.attendance_taken {
            return Err(BookingError::AttendanceAlreadyTaken(self.class_id));
        }
        self.attendance_taken = true;
        Ok(())
    }
}

/// Where a reservation landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The member holds a confirmed seat.
    Enrolled,
    /// The member is queued for the next freed seat.
    Waitlisted,
}

/// What a withdrawal removed, and who moved up because of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Withdrawal {
    /// A confirmed seat was freed. `promoted` is the waitlist head that
    /// took it, when the waitlist was non-empty.
    Seat { promoted: Option<Uuid> },
    /// A waitlist slot was given up. Seats are untouched and nobody moves.
    WaitList,
}

/// A member and the classes they currently hold or wait for.
///
/// The class-id sets mirror the membership lists on [`Class`]: for every
/// open class, the member appears in the class's list exactly when the
/// class appears in the matching set here. The coordinator updates both
/// sides inside one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Unique identifier for the `Member`
    ///
    /// Shared with the surrounding application; the core never mints
    /// member ids.
    pub member_id: Uuid,
    /// Display name.
    pub name: String,
    /// Classes the member holds a confirmed seat in.
    reservations: HashSet<Uuid>,
    /// Classes the member is waitlisted for.
    waitlists: HashSet<Uuid>,
    /// Classes attended, in the order attendance was recorded.
    ///
    /// `classes_attended()` derives from this history; there is no separate
    /// counter to keep in sync.
    attended: Vec<Uuid>,
    absence_count: u32,
}

impl Member {
    pub fn new(member_id: Uuid, name: String) -> Self {
        Self {
            member_id,
            name,
            reservations: HashSet::new(),
            waitlists: HashSet::new(),
            attended: Vec::new(),
            absence_count: 0,
        }
    }

    pub fn has_reservation(&self, class_id: Uuid) -> bool {
        self.reservations.contains(&class_id)
    }

    pub fn is_waitlisted_for(&self, class_id: Uuid) -> bool {
        self.waitlists.contains(&class_id)
    }

    /// Classes the member currently holds a confirmed seat in.
    pub fn reservations(&self) -> &HashSet<Uuid> {
        &self.reservations
    }

    /// Classes the member is currently waitlisted for.
    pub fn waitlists(&self) -> &HashSet<Uuid> {
        &self.waitlists
    }

    /// Classes attended, oldest first.
    pub fn attended(&self) -> &[Uuid] {
        &self.attended
    }

    /// Number of classes attended, derived from the attendance history.
    pub fn classes_attended(&self) -> usize {
        self.attended.len()
    }

    /// Sessions the member held a seat in but missed.
    pub fn absence_count(&self) -> u32 {
        self.absence_count
    }

    /// Mirrors a successful admission into the member's own record.
    pub fn register(&mut self, class_id: Uuid, placement: Placement) {
        match placement {
            Placement::Enrolled => self.reservations.insert(class_id),
            Placement::Waitlisted => self.waitlists.insert(class_id),
        };
    }

    /// Gives up a confirmed seat.
    pub fn remove_reservation(&mut self, class_id: Uuid) {
        self.reservations.remove(&class_id);
    }

    /// Leaves a waitlist queue.
    pub fn remove_waitlist(&mut self, class_id: Uuid) {
        self.waitlists.remove(&class_id);
    }

    /// Moves a class from the waitlist side to a confirmed seat, when the
    /// member is promoted during someone else's cancellation.
    pub fn promote(&mut self, class_id: Uuid) {
        self.waitlists.remove(&class_id);
        self.reservations.insert(class_id);
    }

    /// Converts the live reservation into attendance history.
    pub fn mark_present(&mut self, class_id: Uuid) {
        self.reservations.remove(&class_id);
        self.attended.push(class_id);
    }

    /// Converts the live reservation into a recorded absence.
    pub fn mark_absent(&mut self, class_id: Uuid) {
        self.reservations.remove(&class_id);
        self.absence_count += 1;
    }
}

/// Rejections produced by the record transitions themselves.
///
/// These are expected outcomes under normal operation (a full class, a
/// double tap on "reserve"), not faults. Nothing is mutated when one is
/// returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// The member already holds a seat or a waitlist slot in this class.
    #[error("member {0} is already registered for this class")]
    AlreadyRegistered(Uuid),

    /// The member holds neither a seat nor a waitlist slot in this class.
    #[error("member {0} is not registered for this class")]
    NotRegistered(Uuid),

    /// Every seat and every waitlist slot is taken.
    #[error("class {0} is full and so is its waitlist")]
    CapacityExceeded(Uuid),

    /// The class has already been held.
    #[error("attendance has already been taken for class {0}")]
    AttendanceAlreadyTaken(Uuid),
}
