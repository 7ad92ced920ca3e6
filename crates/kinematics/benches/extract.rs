use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kinematics::extract_angles;
use pose_frame::{Joint, Landmark, PoseFrame};

fn squat_frame() -> PoseFrame {
    PoseFrame::empty(0, 0)
        .with_joint(Joint::Nose, Landmark::new(0.54, 0.22))
        .with_joint(Joint::LeftShoulder, Landmark::new(0.50, 0.28))
        .with_joint(Joint::RightShoulder, Landmark::new(0.51, 0.28))
        .with_joint(Joint::LeftHip, Landmark::new(0.50, 0.40))
        .with_joint(Joint::LeftKnee, Landmark::new(0.50, 0.55))
        .with_joint(Joint::LeftAnkle, Landmark::new(0.55, 0.72))
        .with_joint(Joint::LeftFootIndex, Landmark::new(0.62, 0.73))
}

fn bench_extract(c: &mut Criterion) {
    let frame = squat_frame();
    c.bench_function("extract_angles", |b| {
        b.iter(|| extract_angles(black_box(&frame)))
    });
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
