mod association;
mod beacon;
mod deauthentication;

pub use association::*;
pub use beacon::*;
pub use deauthentication::*;

/// Implement [Addresses](crate::Addresses) for frames that carry a [ManagementHeader](crate::frame::components::ManagementHeader).
macro_rules! management_addresses {
    ($($frame:ty),+) => {
        $(
            impl crate::Addresses for $frame {
                fn src(&self) -> Option<&crate::frame::components::MacAddress> {
                    Some(&self.header.address_2)
                }

                fn dest(&self) -> &crate::frame::components::MacAddress {
                    &self.header.address_1
                }

                fn bssid(&self) -> Option<&crate::frame::components::MacAddress> {
                    Some(&self.header.address_3)
                }
            }
        )+
    };
}

management_addresses!(
    Beacon,
    ProbeRequest,
    ProbeResponse,
    AssociationRequest,
    Deauthentication,
    Disassociation
);
