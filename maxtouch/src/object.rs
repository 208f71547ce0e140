//! Object table discovery.
//!
//! The controller does not keep its objects at fixed register addresses. The
//! information block at address 0 says how many objects there are, and the
//! object table that follows it lists, per object, where it lives and how many
//! report ids its instances own. Both move between firmware builds, so they are
//! read once at start-up and kept in an [`ObjectLayout`].

use heapless::Vec;

use crate::bus::RegisterBus;
use crate::message::ReportTarget;

/// Register address of the information block.
pub const INFORMATION_BLOCK_ADDRESS: u16 = 0x0000;

/// Object type codes the driver knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// T2, encryption status.
    EncryptionStatus,
    /// T5, message processor. Messages are read from here.
    MessageProcessor,
    /// T6, command processor.
    CommandProcessor,
    /// T7, power configuration.
    PowerConfig,
    /// T8, acquisition configuration.
    AcquisitionConfig,
    /// T44, pending message count.
    MessageCount,
    /// T46, capacitive touch engine configuration.
    CteConfig,
    /// T100, multiple touch touchscreen.
    MultipleTouchScreen,
    /// Any other type code. Listed in the table but not used by the driver.
    Other(u8),
}

impl From<u8> for ObjectType {
    fn from(code: u8) -> Self {
        match code {
            2 => Self::EncryptionStatus,
            5 => Self::MessageProcessor,
            6 => Self::CommandProcessor,
            7 => Self::PowerConfig,
            8 => Self::AcquisitionConfig,
            44 => Self::MessageCount,
            46 => Self::CteConfig,
            100 => Self::MultipleTouchScreen,
            other => Self::Other(other),
        }
    }
}

impl ObjectType {
    /// The type code as listed in the object table.
    pub fn code(self) -> u8 {
        match self {
            Self::EncryptionStatus => 2,
            Self::MessageProcessor => 5,
            Self::CommandProcessor => 6,
            Self::PowerConfig => 7,
            Self::AcquisitionConfig => 8,
            Self::MessageCount => 44,
            Self::CteConfig => 46,
            Self::MultipleTouchScreen => 100,
            Self::Other(code) => code,
        }
    }
}

/// Identity and matrix size of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InformationBlock {
    /// Device family.
    pub family_id: u8,
    /// Device variant within the family.
    pub variant_id: u8,
    /// Firmware version.
    pub version: u8,
    /// Firmware build.
    pub build: u8,
    /// Number of X lines of the sensing matrix.
    pub matrix_x_size: u8,
    /// Number of Y lines of the sensing matrix.
    pub matrix_y_size: u8,
    /// Number of entries in the object table.
    pub num_objects: u8,
}

impl InformationBlock {
    /// Size of the information block on the wire.
    pub const LEN: usize = 7;

    /// Parses the information block.
    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            family_id: raw[0],
            variant_id: raw[1],
            version: raw[2],
            build: raw[3],
            matrix_x_size: raw[4],
            matrix_y_size: raw[5],
            num_objects: raw[6],
        }
    }

    /// Register address of the object table entry at `index`.
    pub fn entry_address(index: u8) -> u16 {
        Self::LEN as u16 + u16::from(index) * ObjectTableEntry::LEN as u16
    }
}

/// One entry of the object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTableEntry {
    /// The object described by the entry.
    pub object_type: ObjectType,
    /// Register address of the first instance.
    pub address: u16,
    /// Size of one instance, minus one.
    pub size_minus_one: u8,
    /// Number of instances, minus one.
    pub instances_minus_one: u8,
    /// Report ids owned by each instance.
    pub report_ids_per_instance: u8,
}

impl ObjectTableEntry {
    /// Size of one table entry on the wire.
    pub const LEN: usize = 6;

    /// Parses a table entry. The address is sent most-significant byte first.
    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            object_type: ObjectType::from(raw[0]),
            address: u16::from_be_bytes([raw[1], raw[2]]),
            size_minus_one: raw[3],
            instances_minus_one: raw[4],
            report_ids_per_instance: raw[5],
        }
    }

    /// Number of report ids the entry owns across all its instances.
    pub fn report_id_count(&self) -> u16 {
        u16::from(self.report_ids_per_instance) * (u16::from(self.instances_minus_one) + 1)
    }
}

/// Register address of every object the driver uses. `None` means absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressMap {
    encryption_status: Option<u16>,
    message_processor: Option<u16>,
    command_processor: Option<u16>,
    power_config: Option<u16>,
    acquisition_config: Option<u16>,
    message_count: Option<u16>,
    cte_config: Option<u16>,
    multiple_touch_screen: Option<u16>,
    max_message_size: Option<u8>,
}

impl AddressMap {
    /// Address of `object`, or `None` when the table did not list it.
    pub fn address(&self, object: ObjectType) -> Option<u16> {
        match object {
            ObjectType::EncryptionStatus => self.encryption_status,
            ObjectType::MessageProcessor => self.message_processor,
            ObjectType::CommandProcessor => self.command_processor,
            ObjectType::PowerConfig => self.power_config,
            ObjectType::AcquisitionConfig => self.acquisition_config,
            ObjectType::MessageCount => self.message_count,
            ObjectType::CteConfig => self.cte_config,
            ObjectType::MultipleTouchScreen => self.multiple_touch_screen,
            ObjectType::Other(_) => None,
        }
    }

    /// Largest message the message processor reports, excluding its checksum.
    pub fn max_message_size(&self) -> Option<u8> {
        self.max_message_size
    }

    fn insert(&mut self, entry: &ObjectTableEntry) {
        let slot = match entry.object_type {
            ObjectType::EncryptionStatus => &mut self.encryption_status,
            ObjectType::MessageProcessor => {
                self.max_message_size = Some(entry.size_minus_one.saturating_sub(1));
                &mut self.message_processor
            }
            ObjectType::CommandProcessor => &mut self.command_processor,
            ObjectType::PowerConfig => &mut self.power_config,
            ObjectType::AcquisitionConfig => &mut self.acquisition_config,
            ObjectType::MessageCount => &mut self.message_count,
            ObjectType::CteConfig => &mut self.cte_config,
            ObjectType::MultipleTouchScreen => &mut self.multiple_touch_screen,
            ObjectType::Other(_) => return,
        };
        *slot = Some(entry.address);
    }
}

/// Report ids of the touchscreen object.
///
/// The first id carries the screen status, the second is reserved and the
/// following ones map one-to-one onto contact slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchReportIds<const N: usize> {
    first: u16,
    second: u16,
    subsequent: Vec<u16, N>,
}

impl<const N: usize> TouchReportIds<N> {
    /// Allocates the ids of a touchscreen entry whose first report id is `first`.
    ///
    /// The number of contact ids is capped by both `N` and the entry's
    /// `report_ids_per_instance`.
    pub fn allocate(first: u16, report_ids_per_instance: u8) -> Self {
        let contacts = usize::from(report_ids_per_instance).min(N) as u16;
        let subsequent = (0..contacts)
            .map(|k| first.saturating_add(2 + k))
            .collect();
        Self {
            first,
            second: first.saturating_add(1),
            subsequent,
        }
    }

    /// Screen status report id.
    pub fn first(&self) -> u16 {
        self.first
    }

    /// Reserved report id following the screen status.
    pub fn second(&self) -> u16 {
        self.second
    }

    /// Report ids of the contact slots, in slot order.
    pub fn subsequent(&self) -> &[u16] {
        &self.subsequent
    }

    /// Works out what a message with `report_id` refers to.
    pub fn target(&self, report_id: u8) -> ReportTarget {
        let report_id = u16::from(report_id);
        if report_id == self.first {
            return ReportTarget::ScreenStatus;
        }
        if let (Some(&lowest), Some(&highest)) = (self.subsequent.first(), self.subsequent.last()) {
            if (lowest..=highest).contains(&report_id) {
                let contact = usize::from(report_id - lowest);
                if contact < N && contact < self.subsequent.len() {
                    return ReportTarget::Contact(contact);
                }
                return ReportTarget::Unknown;
            }
        }
        if report_id == self.second {
            return ReportTarget::Reserved;
        }
        ReportTarget::Unknown
    }
}

/// Everything learned from the information block and the object table.
///
/// Built once by [`discover`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout<const N: usize> {
    info: InformationBlock,
    addresses: AddressMap,
    touch_report_ids: Option<TouchReportIds<N>>,
    next_report_id: u16,
    report_ids_in_doubt: bool,
}

impl<const N: usize> ObjectLayout<N> {
    /// Starts an empty layout for a controller described by `info`.
    pub fn new(info: InformationBlock) -> Self {
        Self {
            info,
            addresses: AddressMap::default(),
            touch_report_ids: None,
            next_report_id: 1,
            report_ids_in_doubt: false,
        }
    }

    /// The information block the layout was built from.
    pub fn info(&self) -> &InformationBlock {
        &self.info
    }

    /// Addresses of the discovered objects.
    pub fn addresses(&self) -> &AddressMap {
        &self.addresses
    }

    /// Shortcut for `addresses().address(object)`.
    pub fn address(&self, object: ObjectType) -> Option<u16> {
        self.addresses.address(object)
    }

    /// Report ids of the touchscreen object, when it was discovered.
    pub fn touch_report_ids(&self) -> Option<&TouchReportIds<N>> {
        self.touch_report_ids.as_ref()
    }

    /// The report id the next table entry would start at.
    pub fn next_report_id(&self) -> u16 {
        self.next_report_id
    }

    /// Folds one table entry into the layout, in table order.
    ///
    /// The report id counter advances by the entry's multiplicity whatever its
    /// type. An entry at address 0 keeps its object absent, but a touchscreen
    /// entry still gets its report ids.
    pub fn add_entry(&mut self, entry: &ObjectTableEntry) {
        let first_report_id = self.next_report_id;
        self.next_report_id = self.next_report_id.saturating_add(entry.report_id_count());

        if entry.address == 0 {
            log::warn!(
                "Object T{} listed at address 0, treating it as absent",
                entry.object_type.code()
            );
        } else {
            self.addresses.insert(entry);
        }

        if entry.object_type == ObjectType::MultipleTouchScreen {
            if self.report_ids_in_doubt {
                log::warn!("Touchscreen report ids unknown, touch decoding disabled");
                return;
            }
            self.touch_report_ids = Some(TouchReportIds::allocate(
                first_report_id,
                entry.report_ids_per_instance,
            ));
        }
    }

    /// Records a table entry that could not be read.
    ///
    /// Its report id count is unknown, so every id allocated after it is in
    /// doubt. A touchscreen listed later gets no report ids rather than wrong
    /// ones.
    pub fn skip_unreadable_entry(&mut self) {
        self.report_ids_in_doubt = true;
    }

    /// Whether an unreadable entry left the report id counter unreliable.
    pub fn report_ids_in_doubt(&self) -> bool {
        self.report_ids_in_doubt
    }
}

/// Reads the information block and walks the object table.
///
/// Returns `None` when the information block cannot be read, in which case
/// every object counts as absent. An entry that fails to read is logged and
/// skipped: its object stays absent and the walk carries on with the next one.
pub fn discover<B: RegisterBus, const N: usize>(bus: &mut B) -> Option<ObjectLayout<N>> {
    let mut raw = [0u8; InformationBlock::LEN];
    if let Err(err) = bus.read_register(INFORMATION_BLOCK_ADDRESS, &mut raw) {
        log::warn!("Failed to read the information block: {err:?}");
        return None;
    }
    let info = InformationBlock::parse(&raw);
    log::info!(
        "Found maXTouch {}:{}, fw {}.{} with {} objects. Matrix size {}x{}",
        info.family_id,
        info.variant_id,
        info.version,
        info.build,
        info.num_objects,
        info.matrix_x_size,
        info.matrix_y_size
    );

    let mut layout = ObjectLayout::new(info);
    for index in 0..info.num_objects {
        let mut raw = [0u8; ObjectTableEntry::LEN];
        let address = InformationBlock::entry_address(index);
        match bus.read_register(address, &mut raw) {
            Ok(()) => {
                let entry = ObjectTableEntry::parse(&raw);
                log::debug!("Object table entry {index}: {entry:?}");
                layout.add_entry(&entry);
            }
            Err(err) => {
                log::warn!("Failed to read object table entry {index}: {err:?}");
                layout.skip_unreadable_entry();
            }
        }
    }
    Some(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(
        code: u8,
        address: u16,
        report_ids_per_instance: u8,
        instances: u8,
    ) -> ObjectTableEntry {
        ObjectTableEntry {
            object_type: ObjectType::from(code),
            address,
            size_minus_one: 9,
            instances_minus_one: instances - 1,
            report_ids_per_instance,
        }
    }

    fn info(num_objects: u8) -> InformationBlock {
        InformationBlock {
            num_objects,
            ..InformationBlock::default()
        }
    }

    #[test]
    fn entry_address_is_big_endian() {
        let parsed = ObjectTableEntry::parse(&[100, 0x01, 0x2C, 59, 0, 12]);
        assert_eq!(parsed.object_type, ObjectType::MultipleTouchScreen);
        assert_eq!(parsed.address, 0x012C);
        assert_eq!(parsed.report_ids_per_instance, 12);
    }

    #[test]
    fn entries_follow_the_information_block() {
        assert_eq!(InformationBlock::entry_address(0), 7);
        assert_eq!(InformationBlock::entry_address(3), 25);
    }

    #[test]
    fn touchscreen_report_ids_follow_table_order() {
        let mut layout = ObjectLayout::<5>::new(info(2));
        layout.add_entry(&entry(5, 0x100, 1, 1));
        layout.add_entry(&entry(100, 0x200, 7, 1));

        let ids = layout.touch_report_ids().unwrap();
        assert_eq!(ids.first(), 2);
        assert_eq!(ids.second(), 3);
        assert_eq!(ids.subsequent(), &[4, 5, 6, 7, 8]);
        assert_eq!(ids.target(6), ReportTarget::Contact(2));
        assert_eq!(layout.next_report_id(), 9);
        assert_eq!(layout.address(ObjectType::MessageProcessor), Some(0x100));
        assert_eq!(layout.address(ObjectType::MultipleTouchScreen), Some(0x200));
    }

    #[test]
    fn contact_ids_are_capped_by_the_entry() {
        let ids = TouchReportIds::<5>::allocate(10, 3);
        assert_eq!(ids.subsequent(), &[12, 13, 14]);
        assert_eq!(ids.target(15), ReportTarget::Unknown);
    }

    #[test]
    fn report_targets() {
        let ids = TouchReportIds::<5>::allocate(2, 7);
        assert_eq!(ids.target(2), ReportTarget::ScreenStatus);
        assert_eq!(ids.target(3), ReportTarget::Reserved);
        assert_eq!(ids.target(4), ReportTarget::Contact(0));
        assert_eq!(ids.target(8), ReportTarget::Contact(4));
        assert_eq!(ids.target(1), ReportTarget::Unknown);
        assert_eq!(ids.target(9), ReportTarget::Unknown);
    }

    #[test]
    fn no_contact_ids_means_no_contacts() {
        let ids = TouchReportIds::<5>::allocate(2, 0);
        assert!(ids.subsequent().is_empty());
        assert_eq!(ids.target(4), ReportTarget::Unknown);
        assert_eq!(ids.target(2), ReportTarget::ScreenStatus);
    }

    #[test]
    fn zero_address_still_advances_report_ids() {
        let mut layout = ObjectLayout::<5>::new(info(3));
        layout.add_entry(&entry(7, 0x0000, 2, 2));
        layout.add_entry(&entry(100, 0x0300, 7, 1));

        assert_eq!(layout.address(ObjectType::PowerConfig), None);
        assert_eq!(layout.touch_report_ids().unwrap().first(), 5);
    }

    #[test]
    fn touchscreen_at_low_address_is_kept() {
        let mut layout = ObjectLayout::<5>::new(info(34));
        layout.add_entry(&entry(5, 0x0100, 1, 1));
        layout.add_entry(&entry(100, 0x00C0, 7, 1));

        assert_eq!(layout.address(ObjectType::MultipleTouchScreen), Some(0x00C0));
        assert_eq!(layout.touch_report_ids().unwrap().subsequent(), &[4, 5, 6, 7, 8]);
    }

    #[test]
    fn touchscreen_at_zero_address_keeps_report_ids() {
        let mut layout = ObjectLayout::<5>::new(info(2));
        layout.add_entry(&entry(5, 0x0100, 1, 1));
        layout.add_entry(&entry(100, 0x0000, 7, 1));

        assert_eq!(layout.address(ObjectType::MultipleTouchScreen), None);
        assert_eq!(layout.touch_report_ids().unwrap().first(), 2);
    }

    #[test]
    fn unreadable_entry_before_touchscreen_disables_touch_ids() {
        let mut layout = ObjectLayout::<5>::new(info(3));
        layout.skip_unreadable_entry();
        layout.add_entry(&entry(5, 0x0100, 1, 1));
        layout.add_entry(&entry(100, 0x0200, 7, 1));

        assert!(layout.report_ids_in_doubt());
        assert_eq!(layout.address(ObjectType::MultipleTouchScreen), Some(0x0200));
        assert!(layout.touch_report_ids().is_none());
    }

    #[test]
    fn unreadable_entry_after_touchscreen_keeps_touch_ids() {
        let mut layout = ObjectLayout::<5>::new(info(3));
        layout.add_entry(&entry(5, 0x0100, 1, 1));
        layout.add_entry(&entry(100, 0x0200, 7, 1));
        layout.skip_unreadable_entry();

        assert_eq!(layout.touch_report_ids().unwrap().first(), 2);
    }

    #[test]
    fn unknown_types_only_take_report_ids() {
        let mut layout = ObjectLayout::<5>::new(info(1));
        layout.add_entry(&entry(42, 0x0400, 3, 2));
        assert_eq!(layout.addresses(), &AddressMap::default());
        assert_eq!(layout.next_report_id(), 7);
    }

    #[test]
    fn message_processor_records_message_size() {
        let mut layout = ObjectLayout::<5>::new(info(1));
        layout.add_entry(&entry(5, 0x0100, 0, 1));
        assert_eq!(layout.addresses().max_message_size(), Some(8));
    }

    proptest! {
        #[test]
        fn report_id_counter_sums_multiplicities(
            entries in prop::collection::vec((any::<u8>(), 0u8..16, 0u8..4), 0..32)
        ) {
            let mut layout = ObjectLayout::<5>::new(info(entries.len() as u8));
            let mut expected = 1u16;
            for &(code, report_ids, instances_minus_one) in &entries {
                prop_assert_eq!(layout.next_report_id(), expected);
                layout.add_entry(&ObjectTableEntry {
                    object_type: ObjectType::from(code),
                    address: 0x1000,
                    size_minus_one: 0,
                    instances_minus_one,
                    report_ids_per_instance: report_ids,
                });
                expected += u16::from(report_ids) * (u16::from(instances_minus_one) + 1);
            }
            prop_assert_eq!(layout.next_report_id(), expected);
        }
    }
}
