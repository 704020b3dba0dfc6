mod common;

use common::{bethesda_version, full_registry, plain_version, read_from_bytes, write_to_bytes, Node, Shape};
use nifio::version::to_file;
use nifio::{NiPtr, NiRef, NifError, NifFile, NIF_NPOS};

fn two_nodes() -> NifFile {
    // A(0) <- B(1): B owns a child reference to A.
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::named("a")));
    nif.add_block(Box::new(Node::with_children("b", &[0])));
    nif
}

#[test]
fn add_block_registers_types_once() {
    let mut nif = NifFile::new(bethesda_version());

    let a = nif.add_block(Box::new(Node::named("a")));
    let b = nif.add_block(Box::new(Node::named("b")));
    let s = nif.add_block(Box::new(Shape::named("s")));

    assert_eq!((a, b, s), (0, 1, 2));
    assert_eq!(nif.header().num_blocks(), 3);
    assert_eq!(
        nif.header().block_types().collect::<Vec<_>>(),
        vec!["NiNode", "NiTriShape"]
    );
    assert_eq!(nif.header().block_type_indices(), &[0, 0, 1]);
    nif.validate().unwrap();
}

#[test]
fn deleting_a_referenced_block_severs_the_edge() {
    let mut nif = two_nodes();
    nif.delete_block(0).unwrap();

    assert_eq!(nif.header().num_blocks(), 1);
    // NiNode is still in use by the surviving block.
    assert_eq!(nif.header().num_block_types(), 1);

    let survivor = nif.block_as::<Node>(0).unwrap();
    assert_eq!(survivor.name.get(), "b");
    assert_eq!(survivor.children[0].index, NIF_NPOS);
}

#[test]
fn deleting_the_last_user_of_a_type_drops_it() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::named("a")));
    nif.add_block(Box::new(Shape::named("s")));

    nif.delete_block(1).unwrap();

    assert_eq!(
        nif.header().block_types().collect::<Vec<_>>(),
        vec!["NiNode"]
    );
    assert_eq!(nif.header().block_type_indices(), &[0]);
    nif.validate().unwrap();
}

#[test]
fn deleting_shifts_later_references_down() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::named("a")));
    nif.add_block(Box::new(Node::named("b")));
    nif.add_block(Box::new(Node::with_children("c", &[0, 2])));
    nif.footer_mut().roots.push(NiRef::new(2));

    nif.delete_block(1).unwrap();

    let c = nif.block_as::<Node>(1).unwrap();
    assert_eq!(c.children[0].index, 0);
    assert_eq!(c.children[1].index, 1);
    assert_eq!(nif.footer().roots, vec![NiRef::new(1)]);
}

#[test]
fn delete_null_is_a_noop_and_out_of_range_fails() {
    let mut nif = two_nodes();

    nif.delete_block(NIF_NPOS).unwrap();
    assert_eq!(nif.header().num_blocks(), 2);

    match nif.delete_block(7) {
        Err(NifError::InvariantViolated(_)) => {}
        other => panic!("expected InvariantViolated, got {other:?}"),
    }
}

#[test]
fn delete_by_type_spares_referenced_blocks_when_asked() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::with_children("root", &[1])));
    nif.add_block(Box::new(Shape::named("used")));
    nif.add_block(Box::new(Shape::named("orphan")));

    nif.delete_blocks_by_type("NiTriShape", true).unwrap();

    assert_eq!(nif.header().num_blocks(), 2);
    assert_eq!(nif.block_as::<Shape>(1).unwrap().name.get(), "used");

    nif.delete_blocks_by_type("NiTriShape", false).unwrap();
    assert_eq!(nif.header().num_blocks(), 1);
    assert_eq!(
        nif.header().block_types().collect::<Vec<_>>(),
        vec!["NiNode"]
    );

    // Unregistered type names are a no-op.
    nif.delete_blocks_by_type("NiCamera", false).unwrap();
    assert_eq!(nif.header().num_blocks(), 1);
}

#[test]
fn replacing_a_block_keeps_ordinals_and_compacts_types() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::with_children("root", &[1])));
    nif.add_block(Box::new(Shape::named("old")));

    let id = nif.replace_block(1, Box::new(Node::named("new"))).unwrap();
    assert_eq!(id, 1);

    assert_eq!(
        nif.header().block_types().collect::<Vec<_>>(),
        vec!["NiNode"]
    );
    assert_eq!(nif.header().block_type_indices(), &[0, 0]);

    // The reference into slot 1 still resolves.
    assert_eq!(nif.block_as::<Node>(0).unwrap().children[0].index, 1);
    assert_eq!(nif.block_as::<Node>(1).unwrap().name.get(), "new");
    nif.validate().unwrap();
}

#[test]
fn replace_null_returns_null() {
    let mut nif = two_nodes();
    let id = nif
        .replace_block(NIF_NPOS, Box::new(Node::named("x")))
        .unwrap();
    assert_eq!(id, NIF_NPOS);
    assert_eq!(nif.header().num_blocks(), 2);
}

#[test]
fn reordering_remaps_every_reference() {
    // A(0), B(1) -> A, C(2) -> B, moved so that A lands at 2, B at 0,
    // and C at 1.
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::named("a")));
    nif.add_block(Box::new(Node::with_children("b", &[0])));
    nif.add_block(Box::new(Node::with_children("c", &[1])));
    nif.footer_mut().roots.push(NiRef::new(0));

    nif.set_block_order(&[2, 0, 1]).unwrap();

    let b = nif.block_as::<Node>(0).unwrap();
    assert_eq!(b.name.get(), "b");
    assert_eq!(b.children[0].index, 2);

    let c = nif.block_as::<Node>(1).unwrap();
    assert_eq!(c.name.get(), "c");
    assert_eq!(c.children[0].index, 0);

    assert_eq!(nif.block_as::<Node>(2).unwrap().name.get(), "a");
    assert_eq!(nif.footer().roots, vec![NiRef::new(2)]);
    nif.validate().unwrap();
}

#[test]
fn reordering_remaps_back_pointers() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::with_children("parent", &[1])));
    nif.add_block(Box::new(Node::named("child")));
    nif.block_as_mut::<Node>(1).unwrap().parent = NiPtr::new(0);

    nif.set_block_order(&[1, 0]).unwrap();

    assert_eq!(nif.block_as::<Node>(1).unwrap().children[0].index, 0);
    assert_eq!(nif.block_as::<Node>(0).unwrap().parent.index, 1);
}

#[test]
fn reorder_rejects_bad_orders() {
    let mut nif = two_nodes();

    // Wrong length: silently rejected.
    nif.set_block_order(&[0]).unwrap();
    assert_eq!(nif.block_as::<Node>(0).unwrap().name.get(), "a");

    // Not a permutation: the graph is left untouched.
    match nif.set_block_order(&[0, 0]) {
        Err(NifError::InvariantViolated(_)) => {}
        other => panic!("expected InvariantViolated, got {other:?}"),
    }
    match nif.set_block_order(&[0, 5]) {
        Err(NifError::InvariantViolated(_)) => {}
        other => panic!("expected InvariantViolated, got {other:?}"),
    }
    assert_eq!(nif.block_as::<Node>(0).unwrap().name.get(), "a");
    assert_eq!(nif.block_as::<Node>(1).unwrap().name.get(), "b");
}

#[test]
fn reference_queries_distinguish_edge_kinds() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::with_children("root", &[1, 1])));
    nif.add_block(Box::new(Node::named("child")));
    nif.block_as_mut::<Node>(1).unwrap().parent = NiPtr::new(0);

    assert_eq!(nif.block_ref_count(1, false), 2);
    assert_eq!(nif.block_ref_count(1, true), 2);

    // Block 0 is only reachable through the child's back-pointer.
    assert!(!nif.is_block_referenced(0, false));
    assert!(nif.is_block_referenced(0, true));
    assert_eq!(nif.block_ref_count(0, true), 1);

    assert_eq!(nif.block_ref_count(NIF_NPOS, true), 0);
    assert!(!nif.is_block_referenced(NIF_NPOS, true));
}

#[test]
fn block_identity_lookup() {
    let nif = two_nodes();

    let second = nif.block(1).unwrap();
    assert_eq!(nif.block_id_of(second), 1);

    let stray = Node::named("stray");
    assert_eq!(nif.block_id_of(&stray), NIF_NPOS);
}

#[test]
fn edits_survive_serialization() -> anyhow::Result<()> {
    let mut nif = NifFile::new(plain_version(to_file(20, 2, 0, 7)));
    nif.add_block(Box::new(Node::with_children("root", &[1, 2])));
    nif.add_block(Box::new(Shape::named("a")));
    nif.add_block(Box::new(Shape::named("b")));
    nif.footer_mut().roots.push(NiRef::new(0));

    nif.delete_block(1)?;
    nif.set_block_order(&[1, 0])?;

    let bytes = write_to_bytes(&mut nif)?;
    let reread = read_from_bytes(&bytes, &full_registry())?;
    reread.validate()?;

    let root = reread.block_as::<Node>(1).unwrap();
    assert_eq!(root.children[0].index, NIF_NPOS);
    assert_eq!(root.children[1].index, 0);
    assert_eq!(reread.footer().roots, vec![NiRef::new(1)]);
    Ok(())
}

#[test]
fn type_registry_stays_minimal_through_edit_sequences() {
    let mut nif = NifFile::new(bethesda_version());
    nif.add_block(Box::new(Node::named("n0")));
    nif.add_block(Box::new(Shape::named("s0")));
    nif.add_block(Box::new(Shape::named("s1")));

    nif.delete_block(2).unwrap();
    nif.replace_block(1, Box::new(Node::named("n1"))).unwrap();
    nif.add_block(Box::new(Shape::named("s2")));
    nif.delete_block(0).unwrap();
    nif.set_block_order(&[1, 0]).unwrap();

    nif.validate().unwrap();

    let types: Vec<_> = nif.header().block_types().collect();
    for (i, _) in types.iter().enumerate() {
        assert!(nif
            .header()
            .block_type_indices()
            .iter()
            .any(|&t| t as usize == i));
    }
}
