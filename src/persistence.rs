use crate::state::ServiceState;
use crate::storage::StorageAdapter;

const STATE_KEY: &[u8] = b"atlas-dir/state/v1";

pub fn load_state(storage: &dyn StorageAdapter) -> ServiceState {
    storage
        .read_state(STATE_KEY)
        .and_then(|v| bincode::deserialize::<ServiceState>(&v).ok())
        .unwrap_or_default()
}

pub fn save_state(storage: &mut dyn StorageAdapter, state: &ServiceState) {
    let bytes = bincode::serialize(state).expect("state serializable");
    storage.write_state(STATE_KEY.to_vec(), bytes);
}
