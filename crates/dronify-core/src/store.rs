//! In-memory transactional record store.
//!
//! Every write runs as a transaction over a staged copy of the tables:
//!
//! 1. the operation mutates the staged records and records which
//!    dependency-tracked [`Field`]s it changed (and on which flights),
//! 2. validators run against the staged records,
//! 3. the derived fields reachable from the changed fields are recomputed in
//!    dependency order,
//! 4. the staged tables replace the live ones.
//!
//! Any error in steps 1-3 drops the staged copy, so a rejected write leaves the
//! store exactly as it was. Staging clones every table, so a write costs time
//! and memory proportional to the size of the store.
//!
//! Relations are explicit: a package holds the id of its flight, and pilot
//! authorizations live in a `(contact, drone)` join table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregator;
use crate::codegen::{self, Clock, SystemClock};
use crate::config::DronifyConfig;
use crate::dependencies::{DependencyGraph, Field};
use crate::error::{DronifyError, Result};
use crate::estimator::ConsumptionModel;
use crate::lifecycle::Transition;
use crate::types::{
    Contact, ContactId, ContactUpdate, Drone, DroneId, DroneUpdate, Flight, FlightId,
    FlightUpdate, NewContact, NewDrone, NewFlight, NewPackage, Package, PackageId, PackageUpdate,
    FULL_BATTERY_PERCENT,
};
use crate::validators;

#[derive(Debug, Clone, Default)]
struct Tables {
    contacts: BTreeMap<ContactId, Contact>,
    drones: BTreeMap<DroneId, Drone>,
    packages: BTreeMap<PackageId, Package>,
    flights: BTreeMap<FlightId, Flight>,
    pilot_drones: BTreeSet<(ContactId, DroneId)>,
}

/// Record store for contacts, drones, packages and flights.
#[derive(Debug)]
pub struct RecordStore {
    tables: Tables,
    graph: DependencyGraph,
    model: ConsumptionModel,
    clock: Arc<dyn Clock>,
}

impl RecordStore {
    /// Create an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::DependencyCycle`] if the derived-field
    /// declarations are cyclic.
    pub fn new(model: ConsumptionModel, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            tables: Tables::default(),
            graph: DependencyGraph::flight_metrics()?,
            model,
            clock,
        })
    }

    /// Create an empty store using the configured coefficients and timezone.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::new`].
    pub fn from_config(config: &DronifyConfig) -> Result<Self> {
        Self::new(
            config.consumption,
            Arc::new(SystemClock::new(config.system.tz())),
        )
    }

    /// Coefficients used for consumption estimates.
    #[must_use]
    pub const fn model(&self) -> &ConsumptionModel {
        &self.model
    }

    /// Estimate consumption with the store's coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::InvalidInput`] for negative weight.
    pub fn estimate(&self, total_weight_kg: f64, pilot_is_vip: bool) -> Result<f64> {
        self.model.estimate(total_weight_kg, pilot_is_vip)
    }

    /// Run `f` on a staged clone of all tables and commit it if `f` and the
    /// recompute pass succeed. The clone is O(store size) per write.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Txn<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut txn = Txn {
            tables: self.tables.clone(),
            changed: BTreeSet::new(),
            flights: BTreeSet::new(),
            graph: &self.graph,
            model: &self.model,
        };

        let outcome = f(&mut txn).and_then(|value| txn.recompute().map(|()| value));
        match outcome {
            Ok(value) => {
                debug!(
                    operation,
                    changed = ?txn.changed,
                    flights = txn.flights.len(),
                    "Committed write"
                );
                self.tables = txn.tables;
                Ok(value)
            }
            Err(err) => {
                if err.is_validation_error() {
                    debug!(operation, error = %err, "Write rejected");
                } else {
                    warn!(operation, error = %err, "Write rejected");
                }
                Err(err)
            }
        }
    }

    // =========================================================================
    // CONTACTS
    // =========================================================================

    /// Create a contact.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::Validation`] if the name is blank or the
    /// contact is a pilot without a license.
    pub fn create_contact(&mut self, new: NewContact) -> Result<Contact> {
        let contact = Contact {
            id: ContactId::generate(),
            name: new.name.trim().to_string(),
            is_customer: new.is_customer,
            is_vip: new.is_vip,
            is_pilot: new.is_pilot,
            license_number: normalize_license(new.license_number),
        };

        let contact = self.transact("create_contact", |txn| {
            validators::validate_contact(&contact)?;
            validators::validate_pilot_license(&contact)?;
            txn.tables.contacts.insert(contact.id, contact.clone());
            Ok(contact)
        })?;

        info!(contact_id = %contact.id, is_pilot = contact.is_pilot, "Created contact");
        Ok(contact)
    }

    /// Update a contact.
    ///
    /// Changing the VIP flag refreshes the consumption of every flight the
    /// contact pilots.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id and
    /// [`DronifyError::Validation`] if the result breaks a contact rule.
    pub fn update_contact(&mut self, id: ContactId, update: ContactUpdate) -> Result<Contact> {
        let touches_license = update.touches_pilot_license();

        self.transact("update_contact", |txn| {
            let contact = txn
                .tables
                .contacts
                .get_mut(&id)
                .ok_or_else(|| DronifyError::not_found("contact", id))?;

            if let Some(name) = update.name {
                contact.name = name.trim().to_string();
            }
            if let Some(is_customer) = update.is_customer {
                contact.is_customer = is_customer;
            }
            if let Some(is_vip) = update.is_vip {
                contact.is_vip = is_vip;
            }
            if let Some(is_pilot) = update.is_pilot {
                contact.is_pilot = is_pilot;
            }
            if let Some(license) = update.license_number {
                contact.license_number = normalize_license(Some(license));
            }
            let updated = contact.clone();

            validators::validate_contact(&updated)?;
            if touches_license {
                validators::validate_pilot_license(&updated)?;
            }

            if update.is_vip.is_some() {
                let piloted: Vec<FlightId> = txn
                    .tables
                    .flights
                    .values()
                    .filter(|f| f.pilot_id == id)
                    .map(|f| f.id)
                    .collect();
                txn.touch(Field::ContactVip, piloted);
            }
            Ok(updated)
        })
    }

    /// Look up a contact.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn contact(&self, id: ContactId) -> Result<&Contact> {
        self.tables
            .contacts
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("contact", id))
    }

    /// All contacts in creation order.
    #[must_use]
    pub fn contacts(&self) -> Vec<&Contact> {
        self.tables.contacts.values().collect()
    }

    // =========================================================================
    // PILOT AUTHORIZATIONS
    // =========================================================================

    /// Authorize `contact` to pilot `drone`. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] if either record is missing.
    pub fn authorize_pilot(&mut self, contact: ContactId, drone: DroneId) -> Result<bool> {
        self.transact("authorize_pilot", |txn| {
            txn.contact(contact)?;
            txn.drone(drone)?;
            Ok(txn.tables.pilot_drones.insert((contact, drone)))
        })
    }

    /// Withdraw an authorization. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] if either record is missing.
    pub fn revoke_pilot(&mut self, contact: ContactId, drone: DroneId) -> Result<bool> {
        self.transact("revoke_pilot", |txn| {
            txn.contact(contact)?;
            txn.drone(drone)?;
            Ok(txn.tables.pilot_drones.remove(&(contact, drone)))
        })
    }

    /// Drones `contact` is authorized to pilot.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown contact.
    pub fn authorized_drones(&self, contact: ContactId) -> Result<Vec<&Drone>> {
        self.contact(contact)?;
        Ok(self
            .tables
            .pilot_drones
            .iter()
            .filter(|(c, _)| *c == contact)
            .filter_map(|(_, d)| self.tables.drones.get(d))
            .collect())
    }

    /// Contacts authorized to pilot `drone`.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown drone.
    pub fn authorized_pilots(&self, drone: DroneId) -> Result<Vec<&Contact>> {
        self.drone(drone)?;
        Ok(self
            .tables
            .pilot_drones
            .iter()
            .filter(|(_, d)| *d == drone)
            .filter_map(|(c, _)| self.tables.contacts.get(c))
            .collect())
    }

    // =========================================================================
    // DRONES
    // =========================================================================

    /// Create a drone. Battery defaults to 100 % and status to available.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or out-of-range numbers.
    pub fn create_drone(&mut self, new: NewDrone) -> Result<Drone> {
        let drone = Drone {
            id: DroneId::generate(),
            name: new.name.trim().to_string(),
            max_capacity_kg: new.max_capacity_kg,
            battery_percent: new.battery_percent.unwrap_or(FULL_BATTERY_PERCENT),
            status: new.status.unwrap_or_default(),
        };

        let drone = self.transact("create_drone", |txn| {
            validators::validate_drone(&drone)?;
            txn.tables.drones.insert(drone.id, drone.clone());
            Ok(drone)
        })?;

        info!(drone_id = %drone.id, name = %drone.name, "Created drone");
        Ok(drone)
    }

    /// Update a drone.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id or a validation
    /// error if the result is invalid.
    pub fn update_drone(&mut self, id: DroneId, update: DroneUpdate) -> Result<Drone> {
        self.transact("update_drone", |txn| {
            let drone = txn
                .tables
                .drones
                .get_mut(&id)
                .ok_or_else(|| DronifyError::not_found("drone", id))?;

            if let Some(name) = update.name {
                drone.name = name.trim().to_string();
            }
            if let Some(capacity) = update.max_capacity_kg {
                drone.max_capacity_kg = capacity;
            }
            if let Some(battery) = update.battery_percent {
                drone.battery_percent = battery;
            }
            if let Some(status) = update.status {
                drone.status = status;
            }

            validators::validate_drone(drone)?;
            Ok(drone.clone())
        })
    }

    /// Look up a drone.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn drone(&self, id: DroneId) -> Result<&Drone> {
        self.tables
            .drones
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("drone", id))
    }

    /// All drones in creation order.
    #[must_use]
    pub fn drones(&self) -> Vec<&Drone> {
        self.tables.drones.values().collect()
    }

    // =========================================================================
    // PACKAGES
    // =========================================================================

    /// Create a package, optionally attached to a flight.
    ///
    /// The code is generated from the clock when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad fields, [`DronifyError::NotFound`]
    /// for unknown references and [`DronifyError::ReferenceViolation`] if the
    /// owner is not a customer.
    pub fn create_package(&mut self, new: NewPackage) -> Result<Package> {
        let code = codegen::code_or_generate(new.code, self.clock.now(), codegen::package_code);

        let package = self.transact("create_package", |txn| {
            let package = Package {
                id: PackageId::generate(),
                code,
                description: new.description.trim().to_string(),
                weight_kg: new.weight_kg,
                customer_id: new.customer_id,
                flight_id: None,
            };
            validators::validate_package(&package, txn.contact(package.customer_id)?)?;

            let id = package.id;
            txn.tables.packages.insert(id, package);
            if let Some(flight) = new.flight_id {
                txn.attach(flight, id)?;
            }
            txn.package(id).cloned()
        })?;

        info!(package_id = %package.id, code = %package.code, "Created package");
        Ok(package)
    }

    /// Update a package.
    ///
    /// The code can never change. The flight can only be filled in while the
    /// package is unassigned; use [`RecordStore::detach_package`] to move it.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::ReadOnlyField`] when changing the code or an
    /// existing flight assignment, plus the errors of
    /// [`RecordStore::create_package`].
    pub fn update_package(&mut self, id: PackageId, update: PackageUpdate) -> Result<Package> {
        self.transact("update_package", |txn| {
            let package = txn
                .tables
                .packages
                .get_mut(&id)
                .ok_or_else(|| DronifyError::not_found("package", id))?;

            if let Some(code) = update.code {
                if code != package.code {
                    return Err(DronifyError::ReadOnlyField {
                        entity: "package",
                        field: "code",
                    });
                }
            }
            let assign = match (package.flight_id, update.flight_id) {
                (_, None) => None,
                (Some(current), Some(requested)) if current == requested => None,
                (Some(_), Some(_)) => {
                    return Err(DronifyError::ReadOnlyField {
                        entity: "package",
                        field: "flight_id",
                    })
                }
                (None, Some(requested)) => Some(requested),
            };

            if let Some(description) = update.description {
                package.description = description.trim().to_string();
            }
            if let Some(weight) = update.weight_kg {
                package.weight_kg = weight;
            }
            if let Some(customer) = update.customer_id {
                package.customer_id = customer;
            }
            let updated = package.clone();

            validators::validate_package(&updated, txn.contact(updated.customer_id)?)?;
            if update.weight_kg.is_some() {
                txn.touch(Field::PackageWeight, updated.flight_id);
            }
            if let Some(flight) = assign {
                txn.attach(flight, id)?;
            }
            txn.package(id).cloned()
        })
    }

    /// Look up a package.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn package(&self, id: PackageId) -> Result<&Package> {
        self.tables
            .packages
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("package", id))
    }

    /// All packages in creation order.
    #[must_use]
    pub fn packages(&self) -> Vec<&Package> {
        self.tables.packages.values().collect()
    }

    /// Name of the drone flying the package, if it is assigned to a flight.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown package.
    pub fn package_drone_name(&self, id: PackageId) -> Result<Option<&str>> {
        let package = self.package(id)?;
        Ok(package
            .flight_id
            .and_then(|flight| self.tables.flights.get(&flight))
            .and_then(|flight| self.tables.drones.get(&flight.drone_id))
            .map(|drone| drone.name.as_str()))
    }

    // =========================================================================
    // FLIGHTS
    // =========================================================================

    /// Create a flight in the draft state, optionally with packages.
    ///
    /// Code and name are generated from the clock when not supplied.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for unknown references,
    /// [`DronifyError::ReferenceViolation`] if the pilot is not a pilot and
    /// [`DronifyError::AlreadyAssigned`] if a package belongs to another flight.
    pub fn create_flight(&mut self, new: NewFlight) -> Result<Flight> {
        let now = self.clock.now();
        let code = codegen::code_or_generate(new.code, now, codegen::flight_code);
        let name = new.name.map_or_else(
            || codegen::default_flight_name(now),
            |name| name.trim().to_string(),
        );

        let flight = self.transact("create_flight", |txn| {
            txn.drone(new.drone_id)?;
            let flight = Flight {
                id: FlightId::generate(),
                code,
                name,
                drone_id: new.drone_id,
                pilot_id: new.pilot_id,
                prepared: false,
                realized: false,
                total_weight_kg: 0.0,
                consumption_percent: 0.0,
            };
            validators::validate_flight(&flight, txn.contact(flight.pilot_id)?)?;

            let id = flight.id;
            txn.tables.flights.insert(id, flight);
            txn.touch(Field::FlightPilot, [id]);
            for package in new.package_ids {
                txn.attach(id, package)?;
            }
            Ok(id)
        })?;

        let flight = self.flight(flight)?.clone();
        info!(
            flight_id = %flight.id,
            code = %flight.code,
            total_weight_kg = flight.total_weight_kg,
            "Created flight"
        );
        Ok(flight)
    }

    /// Update a flight's name, drone or pilot.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::ReadOnlyField`] when changing the code, plus
    /// the reference errors of [`RecordStore::create_flight`].
    pub fn update_flight(&mut self, id: FlightId, update: FlightUpdate) -> Result<Flight> {
        self.transact("update_flight", |txn| {
            if let Some(drone) = update.drone_id {
                txn.drone(drone)?;
            }
            let flight = txn
                .tables
                .flights
                .get_mut(&id)
                .ok_or_else(|| DronifyError::not_found("flight", id))?;

            if let Some(code) = update.code {
                if code != flight.code {
                    return Err(DronifyError::ReadOnlyField {
                        entity: "flight",
                        field: "code",
                    });
                }
            }
            if let Some(name) = update.name {
                flight.name = name.trim().to_string();
            }
            if let Some(drone) = update.drone_id {
                flight.drone_id = drone;
            }
            if let Some(pilot) = update.pilot_id {
                flight.pilot_id = pilot;
            }
            let updated = flight.clone();

            validators::validate_flight(&updated, txn.contact(updated.pilot_id)?)?;
            if update.pilot_id.is_some() {
                txn.touch(Field::FlightPilot, [id]);
            }
            Ok(())
        })?;

        self.flight(id).cloned()
    }

    /// Look up a flight.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn flight(&self, id: FlightId) -> Result<&Flight> {
        self.tables
            .flights
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("flight", id))
    }

    /// All flights in creation order.
    #[must_use]
    pub fn flights(&self) -> Vec<&Flight> {
        self.tables.flights.values().collect()
    }

    /// Packages attached to a flight.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown flight.
    pub fn flight_packages(&self, id: FlightId) -> Result<Vec<&Package>> {
        self.flight(id)?;
        Ok(aggregator::attached_to(id, self.tables.packages.values()).collect())
    }

    /// Attach a package to a flight.
    ///
    /// Attaching a package that is already on this flight is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for unknown ids and
    /// [`DronifyError::AlreadyAssigned`] if the package is on another flight.
    pub fn attach_package(&mut self, flight: FlightId, package: PackageId) -> Result<Flight> {
        self.transact("attach_package", |txn| txn.attach(flight, package))?;
        self.flight(flight).cloned()
    }

    /// Detach a package from a flight.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for unknown ids and
    /// [`DronifyError::ReferenceViolation`] if the package is not on this flight.
    pub fn detach_package(&mut self, flight: FlightId, package: PackageId) -> Result<Flight> {
        self.transact("detach_package", |txn| txn.detach(flight, package))?;
        self.flight(flight).cloned()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Apply a lifecycle transition to several flights at once.
    ///
    /// Either every flight is updated or, if one id is unknown, none is.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn transition(&mut self, ids: &[FlightId], transition: Transition) -> Result<Vec<Flight>> {
        self.transact("transition", |txn| {
            let mut updated = Vec::with_capacity(ids.len());
            for id in ids {
                let flight = txn
                    .tables
                    .flights
                    .get_mut(id)
                    .ok_or_else(|| DronifyError::not_found("flight", id))?;
                let changed = transition.apply(flight);
                debug!(flight_id = %id, %transition, changed, status = ?flight.status(), "Flight transition");
                updated.push(flight.clone());
            }
            Ok(updated)
        })
    }

    fn transition_one(&mut self, id: FlightId, transition: Transition) -> Result<Flight> {
        self.transition(&[id], transition)?
            .into_iter()
            .next()
            .ok_or_else(|| DronifyError::not_found("flight", id))
    }

    /// Mark a flight as prepared.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn prepare_flight(&mut self, id: FlightId) -> Result<Flight> {
        self.transition_one(id, Transition::Prepare)
    }

    /// Clear a flight's prepared flag.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn unlock_flight(&mut self, id: FlightId) -> Result<Flight> {
        self.transition_one(id, Transition::Unlock)
    }

    /// Mark a flight as realized.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::NotFound`] for an unknown id.
    pub fn finalize_flight(&mut self, id: FlightId) -> Result<Flight> {
        self.transition_one(id, Transition::Finalize)
    }
}

/// Staged state of one write.
struct Txn<'a> {
    tables: Tables,
    changed: BTreeSet<Field>,
    flights: BTreeSet<FlightId>,
    graph: &'a DependencyGraph,
    model: &'a ConsumptionModel,
}

impl Txn<'_> {
    fn touch(&mut self, field: Field, flights: impl IntoIterator<Item = FlightId>) {
        self.changed.insert(field);
        self.flights.extend(flights);
    }

    fn contact(&self, id: ContactId) -> Result<&Contact> {
        self.tables
            .contacts
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("contact", id))
    }

    fn drone(&self, id: DroneId) -> Result<&Drone> {
        self.tables
            .drones
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("drone", id))
    }

    fn package(&self, id: PackageId) -> Result<&Package> {
        self.tables
            .packages
            .get(&id)
            .ok_or_else(|| DronifyError::not_found("package", id))
    }

    fn attach(&mut self, flight: FlightId, package: PackageId) -> Result<()> {
        if !self.tables.flights.contains_key(&flight) {
            return Err(DronifyError::not_found("flight", flight));
        }
        let record = self
            .tables
            .packages
            .get_mut(&package)
            .ok_or_else(|| DronifyError::not_found("package", package))?;

        match record.flight_id {
            Some(current) if current == flight => return Ok(()),
            Some(current) => {
                return Err(DronifyError::AlreadyAssigned {
                    package: package.to_string(),
                    flight: current.to_string(),
                })
            }
            None => record.flight_id = Some(flight),
        }

        self.touch(Field::PackageFlight, [flight]);
        Ok(())
    }

    fn detach(&mut self, flight: FlightId, package: PackageId) -> Result<()> {
        if !self.tables.flights.contains_key(&flight) {
            return Err(DronifyError::not_found("flight", flight));
        }
        let record = self
            .tables
            .packages
            .get_mut(&package)
            .ok_or_else(|| DronifyError::not_found("package", package))?;

        if record.flight_id != Some(flight) {
            return Err(DronifyError::ReferenceViolation(format!(
                "package {package} is not attached to flight {flight}"
            )));
        }
        record.flight_id = None;

        self.touch(Field::PackageFlight, [flight]);
        Ok(())
    }

    /// Recompute every derived field reachable from the changed fields, on
    /// every flight touched by the write.
    fn recompute(&mut self) -> Result<()> {
        for field in self.graph.dependents(self.changed.iter().copied()) {
            match field {
                Field::FlightTotalWeight => {
                    for id in &self.flights {
                        let total = aggregator::total_weight(aggregator::attached_to(
                            *id,
                            self.tables.packages.values(),
                        ));
                        if !total.is_finite() {
                            return Err(DronifyError::InvalidInput(format!(
                                "total package weight of flight {id} overflows"
                            )));
                        }
                        if let Some(flight) = self.tables.flights.get_mut(id) {
                            flight.total_weight_kg = total;
                        }
                    }
                }
                Field::FlightConsumption => {
                    for id in &self.flights {
                        let Some(flight) = self.tables.flights.get(id) else {
                            continue;
                        };
                        let pilot_is_vip = self
                            .tables
                            .contacts
                            .get(&flight.pilot_id)
                            .is_some_and(|pilot| pilot.is_vip);
                        let consumption = self.model.estimate(flight.total_weight_kg, pilot_is_vip)?;
                        if !consumption.is_finite() {
                            return Err(DronifyError::InvalidInput(format!(
                                "consumption estimate of flight {id} overflows (total weight {} kg)",
                                flight.total_weight_kg
                            )));
                        }
                        if let Some(flight) = self.tables.flights.get_mut(id) {
                            flight.consumption_percent = consumption;
                        }
                    }
                }
                Field::PackageWeight | Field::PackageFlight | Field::ContactVip | Field::FlightPilot => {
                    debug!(%field, "Input field has no recompute rule");
                    continue;
                }
            }
            debug!(%field, flights = self.flights.len(), "Recomputed derived field");
        }
        Ok(())
    }
}

fn normalize_license(license: Option<String>) -> Option<String> {
    license
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::FixedClock;
    use crate::lifecycle::FlightStatus;
    use crate::validators::LICENSE_REQUIRED;
    use chrono::NaiveDate;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn store() -> RecordStore {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap();
        RecordStore::new(ConsumptionModel::default(), Arc::new(FixedClock(instant))).unwrap()
    }

    fn customer(store: &mut RecordStore, vip: bool) -> ContactId {
        store
            .create_contact(NewContact {
                name: "Customer".into(),
                is_customer: true,
                is_vip: vip,
                ..NewContact::default()
            })
            .unwrap()
            .id
    }

    fn pilot(store: &mut RecordStore, vip: bool) -> ContactId {
        store
            .create_contact(NewContact {
                name: "Pilot".into(),
                is_pilot: true,
                is_vip: vip,
                license_number: Some("LIC-001".into()),
                ..NewContact::default()
            })
            .unwrap()
            .id
    }

    fn drone(store: &mut RecordStore) -> DroneId {
        store
            .create_drone(NewDrone {
                name: "Halcón".into(),
                max_capacity_kg: 10.0,
                battery_percent: None,
                status: None,
            })
            .unwrap()
            .id
    }

    fn flight(store: &mut RecordStore, pilot_id: ContactId) -> FlightId {
        let drone_id = drone(store);
        store
            .create_flight(NewFlight {
                code: None,
                name: None,
                drone_id,
                pilot_id,
                package_ids: Vec::new(),
            })
            .unwrap()
            .id
    }

    fn package(store: &mut RecordStore, owner: ContactId, weight_kg: f64) -> PackageId {
        store
            .create_package(NewPackage {
                code: None,
                description: "Box".into(),
                weight_kg,
                customer_id: owner,
                flight_id: None,
            })
            .unwrap()
            .id
    }

    fn assert_consistent(store: &RecordStore, id: FlightId) {
        let flight = store.flight(id).unwrap();
        let total = aggregator::total_weight(store.flight_packages(id).unwrap());
        assert!(approx(flight.total_weight_kg, total));
        let vip = store.contact(flight.pilot_id).unwrap().is_vip;
        assert!(approx(
            flight.consumption_percent,
            store.estimate(flight.total_weight_kg, vip).unwrap()
        ));
    }

    // -------------------------------------------------------------------------
    // contacts
    // -------------------------------------------------------------------------

    #[test]
    fn test_pilot_without_license_rejected_on_create() {
        let mut store = store();
        let err = store
            .create_contact(NewContact {
                name: "Nope".into(),
                is_pilot: true,
                license_number: Some(String::new()),
                ..NewContact::default()
            })
            .unwrap_err();

        assert!(matches!(err, DronifyError::Validation(ref m) if m == LICENSE_REQUIRED));
        assert!(store.contacts().is_empty());
    }

    #[test]
    fn test_non_pilot_never_needs_license() {
        let mut store = store();
        let id = customer(&mut store, false);
        let updated = store
            .update_contact(
                id,
                ContactUpdate {
                    license_number: Some(String::new()),
                    ..ContactUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.license_number, None);
    }

    #[test]
    fn test_update_making_pilot_without_license_rejected_atomically() {
        let mut store = store();
        let id = customer(&mut store, false);

        let err = store
            .update_contact(
                id,
                ContactUpdate {
                    name: Some("Renamed".into()),
                    is_pilot: Some(true),
                    ..ContactUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DronifyError::Validation(_)));

        // nothing from the rejected write was applied
        let contact = store.contact(id).unwrap();
        assert_eq!(contact.name, "Customer");
        assert!(!contact.is_pilot);
    }

    #[test]
    fn test_clearing_pilot_license_rejected() {
        let mut store = store();
        let id = pilot(&mut store, false);
        let err = store
            .update_contact(
                id,
                ContactUpdate {
                    license_number: Some("  ".into()),
                    ..ContactUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DronifyError::Validation(_)));
        assert_eq!(
            store.contact(id).unwrap().license_number.as_deref(),
            Some("LIC-001")
        );
    }

    #[test]
    fn test_pilot_with_license_accepted() {
        let mut store = store();
        let id = pilot(&mut store, false);
        assert!(store.contact(id).unwrap().is_pilot);
    }

    // -------------------------------------------------------------------------
    // pilot authorizations
    // -------------------------------------------------------------------------

    #[test]
    fn test_authorizations_are_visible_from_both_sides() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let d1 = drone(&mut store);
        let d2 = drone(&mut store);

        assert!(store.authorize_pilot(p, d1).unwrap());
        assert!(!store.authorize_pilot(p, d1).unwrap());
        assert!(store.authorize_pilot(p, d2).unwrap());

        assert_eq!(store.authorized_drones(p).unwrap().len(), 2);
        let pilots = store.authorized_pilots(d1).unwrap();
        assert_eq!(pilots.len(), 1);
        assert_eq!(pilots[0].id, p);

        assert!(store.revoke_pilot(p, d1).unwrap());
        assert!(!store.revoke_pilot(p, d1).unwrap());
        assert!(store.authorized_pilots(d1).unwrap().is_empty());
    }

    #[test]
    fn test_authorize_unknown_drone() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let err = store.authorize_pilot(p, DroneId::generate()).unwrap_err();
        assert!(matches!(err, DronifyError::NotFound { entity: "drone", .. }));
    }

    // -------------------------------------------------------------------------
    // drones
    // -------------------------------------------------------------------------

    #[test]
    fn test_drone_defaults() {
        let mut store = store();
        let id = drone(&mut store);
        let drone = store.drone(id).unwrap();
        assert_eq!(drone.battery_percent, 100);
        assert_eq!(drone.status, crate::types::DroneStatus::Available);
    }

    #[test]
    fn test_drone_update_validated() {
        let mut store = store();
        let id = drone(&mut store);
        assert!(store
            .update_drone(
                id,
                DroneUpdate {
                    battery_percent: Some(150),
                    ..DroneUpdate::default()
                }
            )
            .is_err());
        assert_eq!(store.drone(id).unwrap().battery_percent, 100);
    }

    // -------------------------------------------------------------------------
    // packages
    // -------------------------------------------------------------------------

    #[test]
    fn test_package_code_generated_with_full_year() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let id = package(&mut store, owner, 1.0);
        assert_eq!(store.package(id).unwrap().code, "20240301102030");
    }

    #[test]
    fn test_package_codes_collide_within_one_second() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let a = package(&mut store, owner, 1.0);
        let b = package(&mut store, owner, 2.0);
        // no uniqueness is enforced on generated codes
        assert_eq!(
            store.package(a).unwrap().code,
            store.package(b).unwrap().code
        );
    }

    #[test]
    fn test_package_supplied_code_kept_and_immutable() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let id = store
            .create_package(NewPackage {
                code: Some("PKG-1".into()),
                description: "Box".into(),
                weight_kg: 1.0,
                customer_id: owner,
                flight_id: None,
            })
            .unwrap()
            .id;
        assert_eq!(store.package(id).unwrap().code, "PKG-1");

        let err = store
            .update_package(
                id,
                PackageUpdate {
                    code: Some("PKG-2".into()),
                    ..PackageUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DronifyError::ReadOnlyField { field: "code", .. }));

        // re-sending the same code is accepted
        assert!(store
            .update_package(
                id,
                PackageUpdate {
                    code: Some("PKG-1".into()),
                    ..PackageUpdate::default()
                },
            )
            .is_ok());
    }

    #[test]
    fn test_package_supplied_code_stored_verbatim() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let id = store
            .create_package(NewPackage {
                code: Some(" PKG-1 ".into()),
                description: "Box".into(),
                weight_kg: 1.0,
                customer_id: owner,
                flight_id: None,
            })
            .unwrap()
            .id;
        assert_eq!(store.package(id).unwrap().code, " PKG-1 ");

        // the trimmed form is a different code
        let err = store
            .update_package(
                id,
                PackageUpdate {
                    code: Some("PKG-1".into()),
                    ..PackageUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DronifyError::ReadOnlyField { field: "code", .. }));
    }

    #[test]
    fn test_package_owner_must_be_customer() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let err = store
            .create_package(NewPackage {
                code: None,
                description: "Box".into(),
                weight_kg: 1.0,
                customer_id: p,
                flight_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, DronifyError::ReferenceViolation(_)));
        assert!(store.packages().is_empty());
    }

    #[test]
    fn test_package_rejects_negative_weight() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let err = store
            .create_package(NewPackage {
                code: None,
                description: "Box".into(),
                weight_kg: -1.0,
                customer_id: owner,
                flight_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, DronifyError::InvalidInput(_)));
    }

    #[test]
    fn test_package_created_on_flight_updates_weight() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);

        let package = store
            .create_package(NewPackage {
                code: None,
                description: "Box".into(),
                weight_kg: 3.0,
                customer_id: owner,
                flight_id: Some(f),
            })
            .unwrap();

        assert_eq!(package.flight_id, Some(f));
        assert!(approx(store.flight(f).unwrap().total_weight_kg, 3.0));
        assert_consistent(&store, f);
        assert_eq!(
            store.package_drone_name(package.id).unwrap(),
            Some("Halcón")
        );
    }

    #[test]
    fn test_package_flight_read_only_once_set() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f1 = flight(&mut store, p);
        let f2 = flight(&mut store, p);
        let pkg = package(&mut store, owner, 1.0);

        // filling in an empty assignment is allowed
        store
            .update_package(
                pkg,
                PackageUpdate {
                    flight_id: Some(f1),
                    ..PackageUpdate::default()
                },
            )
            .unwrap();
        assert!(approx(store.flight(f1).unwrap().total_weight_kg, 1.0));

        let err = store
            .update_package(
                pkg,
                PackageUpdate {
                    flight_id: Some(f2),
                    weight_kg: Some(5.0),
                    ..PackageUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DronifyError::ReadOnlyField { field: "flight_id", .. }));
        // rejected write changed nothing
        assert!(approx(store.package(pkg).unwrap().weight_kg, 1.0));
        assert!(approx(store.flight(f2).unwrap().total_weight_kg, 0.0));
    }

    #[test]
    fn test_unassigned_package_has_no_drone_name() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let pkg = package(&mut store, owner, 1.0);
        assert_eq!(store.package_drone_name(pkg).unwrap(), None);
    }

    // -------------------------------------------------------------------------
    // flights & derived fields
    // -------------------------------------------------------------------------

    #[test]
    fn test_new_flight_defaults() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let id = flight(&mut store, p);
        let flight = store.flight(id).unwrap();

        assert_eq!(flight.code, "240301102030");
        assert_eq!(flight.name, "20240301_Vuelo");
        assert_eq!(flight.status(), FlightStatus::Draft);
        assert!(approx(flight.total_weight_kg, 0.0));
        assert!(approx(
            flight.consumption_percent,
            store.estimate(0.0, false).unwrap()
        ));
    }

    #[test]
    fn test_flight_and_package_codes_differ_in_year_width() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let pkg = package(&mut store, owner, 1.0);

        assert_eq!(store.flight(f).unwrap().code.len(), 12);
        assert_eq!(store.package(pkg).unwrap().code.len(), 14);
    }

    #[test]
    fn test_flight_pilot_must_be_pilot() {
        let mut store = store();
        let c = customer(&mut store, false);
        let d = drone(&mut store);
        let err = store
            .create_flight(NewFlight {
                code: None,
                name: None,
                drone_id: d,
                pilot_id: c,
                package_ids: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, DronifyError::ReferenceViolation(_)));
        assert!(store.flights().is_empty());
    }

    #[test]
    fn test_flight_requires_existing_drone() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let err = store
            .create_flight(NewFlight {
                code: None,
                name: None,
                drone_id: DroneId::generate(),
                pilot_id: p,
                package_ids: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, DronifyError::NotFound { entity: "drone", .. }));
    }

    #[test]
    fn test_attach_two_packages_sums_weight() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let a = package(&mut store, owner, 2.5);
        let b = package(&mut store, owner, 1.5);

        store.attach_package(f, a).unwrap();
        let flight = store.attach_package(f, b).unwrap();

        assert!(approx(flight.total_weight_kg, 4.0));
        assert!(approx(flight.consumption_percent, store.estimate(4.0, false).unwrap()));
        assert_consistent(&store, f);
    }

    #[test]
    fn test_overflowing_weight_rejected_on_attach() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let heavy = package(&mut store, owner, 1e308);

        // the weight itself is finite, its consumption estimate is not
        let err = store.attach_package(f, heavy).unwrap_err();
        assert!(
            matches!(&err, DronifyError::InvalidInput(msg) if msg.contains("overflows")),
            "unexpected error: {err:?}"
        );
        assert!(store.flight_packages(f).unwrap().is_empty());
        assert!(store.flight(f).unwrap().consumption_percent.is_finite());

        let a = package(&mut store, owner, 1.7e308);
        let b = package(&mut store, owner, 1.7e308);
        let d = drone(&mut store);
        let err = store
            .create_flight(NewFlight {
                code: None,
                name: None,
                drone_id: d,
                pilot_id: p,
                package_ids: vec![a, b],
            })
            .unwrap_err();
        assert!(
            matches!(&err, DronifyError::InvalidInput(msg) if msg.contains("total package weight")),
            "unexpected error: {err:?}"
        );
        assert_eq!(store.flights().len(), 1);
    }

    #[test]
    fn test_create_flight_with_packages() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, true);
        let d = drone(&mut store);
        let a = package(&mut store, owner, 2.5);
        let b = package(&mut store, owner, 1.5);

        let flight = store
            .create_flight(NewFlight {
                code: Some("F-1".into()),
                name: Some("Morning run".into()),
                drone_id: d,
                pilot_id: p,
                package_ids: vec![a, b],
            })
            .unwrap();

        assert_eq!(flight.code, "F-1");
        assert_eq!(flight.name, "Morning run");
        assert!(approx(flight.total_weight_kg, 4.0));
        assert!(approx(flight.consumption_percent, store.estimate(4.0, true).unwrap()));
    }

    #[test]
    fn test_weight_edit_and_detach_recompute() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let a = package(&mut store, owner, 2.5);
        let b = package(&mut store, owner, 1.5);
        store.attach_package(f, a).unwrap();
        store.attach_package(f, b).unwrap();

        store
            .update_package(
                a,
                PackageUpdate {
                    weight_kg: Some(5.0),
                    ..PackageUpdate::default()
                },
            )
            .unwrap();
        assert!(approx(store.flight(f).unwrap().total_weight_kg, 6.5));
        assert_consistent(&store, f);

        store.detach_package(f, a).unwrap();
        assert!(approx(store.flight(f).unwrap().total_weight_kg, 1.5));
        assert_consistent(&store, f);

        store.detach_package(f, b).unwrap();
        assert!(approx(store.flight(f).unwrap().total_weight_kg, 0.0));
        assert_consistent(&store, f);
    }

    #[test]
    fn test_detached_package_can_move_to_another_flight() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f1 = flight(&mut store, p);
        let f2 = flight(&mut store, p);
        let pkg = package(&mut store, owner, 2.0);

        store.attach_package(f1, pkg).unwrap();
        let err = store.attach_package(f2, pkg).unwrap_err();
        assert!(matches!(err, DronifyError::AlreadyAssigned { .. }));

        store.detach_package(f1, pkg).unwrap();
        store.attach_package(f2, pkg).unwrap();
        assert!(approx(store.flight(f1).unwrap().total_weight_kg, 0.0));
        assert!(approx(store.flight(f2).unwrap().total_weight_kg, 2.0));
    }

    #[test]
    fn test_detach_package_not_on_flight() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let pkg = package(&mut store, owner, 2.0);
        assert!(matches!(
            store.detach_package(f, pkg),
            Err(DronifyError::ReferenceViolation(_))
        ));
    }

    #[test]
    fn test_unattached_package_weight_edit_leaves_flights_alone() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let pkg = package(&mut store, owner, 2.0);

        store
            .update_package(
                pkg,
                PackageUpdate {
                    weight_kg: Some(8.0),
                    ..PackageUpdate::default()
                },
            )
            .unwrap();
        assert!(approx(store.flight(f).unwrap().total_weight_kg, 0.0));
    }

    #[test]
    fn test_pilot_vip_change_recomputes_consumption() {
        let mut store = store();
        let owner = customer(&mut store, false);
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let pkg = package(&mut store, owner, 2.0);
        store.attach_package(f, pkg).unwrap();
        let before = store.flight(f).unwrap().consumption_percent;

        store
            .update_contact(
                p,
                ContactUpdate {
                    is_vip: Some(true),
                    ..ContactUpdate::default()
                },
            )
            .unwrap();

        let after = store.flight(f).unwrap().consumption_percent;
        assert!(approx(after, store.estimate(2.0, true).unwrap()));
        assert!(!approx(before, after));
        assert_consistent(&store, f);
    }

    #[test]
    fn test_changing_pilot_recomputes_consumption() {
        let mut store = store();
        let regular = pilot(&mut store, false);
        let vip = pilot(&mut store, true);
        let f = flight(&mut store, regular);

        let flight = store
            .update_flight(
                f,
                FlightUpdate {
                    pilot_id: Some(vip),
                    ..FlightUpdate::default()
                },
            )
            .unwrap();
        assert!(approx(
            flight.consumption_percent,
            store.estimate(0.0, true).unwrap()
        ));
    }

    #[test]
    fn test_flight_code_is_read_only() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);
        let err = store
            .update_flight(
                f,
                FlightUpdate {
                    code: Some("999999999999".into()),
                    ..FlightUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DronifyError::ReadOnlyField { entity: "flight", .. }));
        assert_eq!(store.flight(f).unwrap().code, "240301102030");
    }

    #[test]
    fn test_flight_cannot_switch_to_non_pilot() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let c = customer(&mut store, false);
        let f = flight(&mut store, p);
        assert!(store
            .update_flight(
                f,
                FlightUpdate {
                    pilot_id: Some(c),
                    ..FlightUpdate::default()
                },
            )
            .is_err());
        assert_eq!(store.flight(f).unwrap().pilot_id, p);
    }

    // -------------------------------------------------------------------------
    // lifecycle
    // -------------------------------------------------------------------------

    #[test]
    fn test_lifecycle_through_store() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let f = flight(&mut store, p);

        let once = store.prepare_flight(f).unwrap();
        let twice = store.prepare_flight(f).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.status(), FlightStatus::Prepared);

        let done = store.finalize_flight(f).unwrap();
        assert_eq!(done.status(), FlightStatus::Completed);
        assert_eq!(store.finalize_flight(f).unwrap(), done);

        let reopened = store.unlock_flight(f).unwrap();
        assert_eq!((reopened.prepared, reopened.realized), (false, true));
        assert_eq!(reopened.status(), FlightStatus::Reopened);
    }

    #[test]
    fn test_batch_transition_is_all_or_nothing() {
        let mut store = store();
        let p = pilot(&mut store, false);
        let f1 = flight(&mut store, p);
        let f2 = flight(&mut store, p);

        let err = store
            .transition(&[f1, FlightId::generate()], Transition::Prepare)
            .unwrap_err();
        assert!(matches!(err, DronifyError::NotFound { .. }));
        assert!(!store.flight(f1).unwrap().prepared);

        let updated = store.transition(&[f1, f2], Transition::Finalize).unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|f| f.realized && !f.prepared));
    }
}
