use crate::pir_internals::{matrix::Matrix, prg::PrgSeed};

/// Ordered bundle of matrices held by one protocol role; the client's query
/// secrets and the server's retained artifacts travel in these.
#[derive(Clone, Debug, Default)]
pub struct State {
    pub data: Vec<Matrix>,
}

impl State {
    pub fn new(data: Vec<Matrix>) -> State {
        State { data }
    }

    pub fn empty() -> State {
        State { data: Vec::new() }
    }
}

/// Stand-in for a [`State`] whose matrices both sides can regenerate from a
/// shared pseudorandom seed, shrinking the shared-setup transfer to
/// [`crate::SEED_BYTE_LEN`] bytes.
#[derive(Clone, Debug)]
pub struct CompressedState {
    pub seed: PrgSeed,
}

impl CompressedState {
    pub fn new(seed: PrgSeed) -> CompressedState {
        CompressedState { seed }
    }
}

/// One protocol message: an ordered bundle of matrices exchanged between the
/// two roles.
#[derive(Clone, Debug, Default)]
pub struct Msg {
    pub data: Vec<Matrix>,
}

impl Msg {
    pub fn new(data: Vec<Matrix>) -> Msg {
        Msg { data }
    }

    pub fn from_matrix(mat: Matrix) -> Msg {
        Msg { data: vec![mat] }
    }

    /// Number of cells across all contained matrices. Every bandwidth figure
    /// in this crate is `size() * logq` bits.
    pub fn size(&self) -> u64 {
        self.data.iter().map(|mat| mat.size()).sum()
    }
}

/// Batch of independent queries answered in a single pass.
#[derive(Clone, Debug, Default)]
pub struct MsgSlice {
    pub data: Vec<Msg>,
}

impl MsgSlice {
    pub fn new(data: Vec<Msg>) -> MsgSlice {
        MsgSlice { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> u64 {
        self.data.iter().map(|msg| msg.size()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_size_sums_all_contained_matrices() {
        let msg = Msg::new(vec![Matrix::new(4, 3), Matrix::new(7, 1)]);
        assert_eq!(msg.size(), 4 * 3 + 7);

        let batch = MsgSlice::new(vec![msg.clone(), Msg::from_matrix(Matrix::new(2, 2))]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size(), msg.size() + 4);
    }
}
