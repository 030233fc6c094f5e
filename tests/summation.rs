// End-to-end summation through the public entry points
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vsum_core::{sum, sum_o1, sum_o2, sum_pair, Accelerator, DeviceConfig, InputSet, Variant};

fn all_variants(inputs: &InputSet<'_>) -> [Vec<i32>; 3] {
    [
        sum(inputs).unwrap(),
        sum_o1(inputs).unwrap(),
        sum_o2(inputs).unwrap(),
    ]
}

#[test]
fn three_by_three() {
    let inputs =
        InputSet::from_rows(&[vec![1, 2, 3], vec![10, 20, 30], vec![100, 200, 300]]).unwrap();
    for result in all_variants(&inputs) {
        assert_eq!(result, vec![111, 222, 333]);
    }
}

#[test]
fn single_vector_is_identity() {
    let inputs = InputSet::from_rows(&[vec![5]]).unwrap();
    for result in all_variants(&inputs) {
        assert_eq!(result, vec![5]);
    }

    let a: Vec<i32> = (0..1000).map(|i| i * 7 - 300).collect();
    let inputs = InputSet::from_rows(&[a.clone()]).unwrap();
    for result in all_variants(&inputs) {
        assert_eq!(result, a);
    }
}

#[test]
fn empty_vectors_give_an_empty_result() {
    let inputs = InputSet::from_rows(&[Vec::<i32>::new(), Vec::new(), Vec::new()]).unwrap();
    for result in all_variants(&inputs) {
        assert!(result.is_empty());
    }
}

#[test]
fn pair_form_adds_two_vectors() {
    assert_eq!(sum_pair(&[1, 2, 3], &[4, 5, 6]).unwrap(), vec![5, 7, 9]);
}

#[test]
fn ten_vectors_of_65536() {
    let mut rng = StdRng::seed_from_u64(42);
    let rows: Vec<Vec<i32>> = (0..10)
        .map(|_| (0..1 << 16).map(|_| rng.gen_range(0..100)).collect())
        .collect();
    let inputs = InputSet::from_rows(&rows).unwrap();

    // independent serial re-summation
    let expected: Vec<i32> = (0..1 << 16)
        .map(|i| rows.iter().map(|row| row[i]).sum())
        .collect();

    for result in all_variants(&inputs) {
        assert_eq!(result.len(), 1 << 16);
        assert_eq!(result, expected);
    }
}

#[test]
fn multi_wave_launches_agree() {
    let acc = Accelerator::new(
        DeviceConfig::default()
            .with_units_per_group(32)
            .with_max_groups_per_wave(3),
    );
    let rows: Vec<Vec<i32>> = (0..5).map(|k| (0..1001).map(|i| i * k).collect()).collect();
    let inputs = InputSet::from_rows(&rows).unwrap();
    let expected = inputs.column_sums();

    for variant in Variant::ALL {
        let (result, stats) = acc.sum_timed(variant, &inputs).unwrap();
        assert_eq!(result, expected, "{variant}");
        assert_eq!(stats.groups, 32);
        assert_eq!(stats.waves, 11);
    }
}

#[test]
fn large_k_shrinks_staged_groups_but_still_matches() {
    let acc = Accelerator::default();
    let rows: Vec<Vec<i32>> = (0..200).map(|k| vec![k; 700]).collect();
    let inputs = InputSet::from_rows(&rows).unwrap();

    let (result, stats) = acc.sum_timed(Variant::SharedStaged, &inputs).unwrap();
    assert_eq!(result, vec![(0..200).sum::<i32>(); 700]);
    // 12288 scratch words / 200 rows -> 61 units -> 32 (one warp)
    assert_eq!(stats.units_per_group, 32);
    assert_eq!(acc.sum(&inputs).unwrap(), result);
}

#[test]
fn borrowed_numpy_style_views_work() {
    let host = ndarray::Array2::from_shape_fn((4, 300), |(k, i)| (k * 1000 + i) as i32);
    let inputs = InputSet::from_view(host.view()).unwrap();
    let expected: Vec<i32> = (0..300).map(|i| 6000 + 4 * i as i32).collect();
    for result in all_variants(&inputs) {
        assert_eq!(result, expected);
    }
}

fn shapes() -> impl Strategy<Value = Vec<Vec<i32>>> {
    (1usize..8, 0usize..700).prop_flat_map(|(k, n)| {
        prop::collection::vec(prop::collection::vec(-1000i32..1000, n), k)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn variants_match_serial_column_sums(rows in shapes()) {
        let inputs = InputSet::from_rows(&rows).unwrap();
        let n = inputs.len();
        let expected: Vec<i32> = (0..n).map(|i| rows.iter().map(|row| row[i]).sum()).collect();

        let [base, o1, o2] = all_variants(&inputs);
        prop_assert_eq!(base.len(), n);
        prop_assert_eq!(&base, &expected);
        prop_assert_eq!(&o1, &base);
        prop_assert_eq!(&o2, &base);
    }

    #[test]
    fn small_groups_do_not_change_results(rows in shapes(), units in 1usize..70) {
        let acc = Accelerator::new(
            DeviceConfig::default()
                .with_units_per_group(units)
                .with_max_groups_per_wave(4),
        );
        let inputs = InputSet::from_rows(&rows).unwrap();
        let expected = inputs.column_sums();
        for variant in Variant::ALL {
            prop_assert_eq!(acc.sum_with(variant, &inputs).unwrap(), expected.clone());
        }
        prop_assert_eq!(acc.device().used_bytes(), 0);
    }
}
