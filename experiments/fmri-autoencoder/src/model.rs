use burn::module::Param;
use burn::nn::Linear;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nsdae_core::seeded_rng;
use rand::{rngs::StdRng, Rng};

/// Width of the hidden layer in both stacks.
pub const HIDDEN_DIM: usize = 500;

/// Two dense stacks: encoder `voxels -> 500 -> latent`, decoder
/// `latent -> 500 -> voxels`, ReLU between the layers of each stack.
#[derive(burn::module::Module, Debug)]
pub struct Autoencoder<B: Backend> {
    encoder_fc1: Linear<B>,
    encoder_fc2: Linear<B>,
    decoder_fc1: Linear<B>,
    decoder_fc2: Linear<B>,
}

impl<B: Backend> Autoencoder<B> {
    /// Seeded uniform init so a run is reproducible from its config.
    pub fn init(device: &B::Device, voxels: usize, latent_dim: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let encoder_fc1 = linear_from_rng::<B>(&mut rng, device, voxels, HIDDEN_DIM);
        let encoder_fc2 = linear_from_rng::<B>(&mut rng, device, HIDDEN_DIM, latent_dim);
        let decoder_fc1 = linear_from_rng::<B>(&mut rng, device, latent_dim, HIDDEN_DIM);
        let decoder_fc2 = linear_from_rng::<B>(&mut rng, device, HIDDEN_DIM, voxels);

        Self {
            encoder_fc1,
            encoder_fc2,
            decoder_fc1,
            decoder_fc2,
        }
    }

    pub fn encode(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = relu(self.encoder_fc1.forward(x));
        self.encoder_fc2.forward(hidden)
    }

    pub fn decode(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = relu(self.decoder_fc1.forward(latent));
        self.decoder_fc2.forward(hidden)
    }

    /// Reconstruction and the latent activations it came from.
    pub fn forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let latent = self.encode(x);
        let recon = self.decode(latent.clone());
        (recon, latent)
    }
}

fn linear_from_rng<B: Backend>(
    rng: &mut StdRng,
    device: &B::Device,
    fan_in: usize,
    fan_out: usize,
) -> Linear<B> {
    let limit = (1.0f32 / fan_in as f32).sqrt();
    let weight = random_tensor::<B, 2>(rng, [fan_in, fan_out], limit, device);
    let bias = random_tensor::<B, 1>(rng, [fan_out], limit, device);

    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

fn random_tensor<B: Backend, const D: usize>(
    rng: &mut StdRng,
    shape: [usize; D],
    limit: f32,
    device: &B::Device,
) -> Tensor<B, D> {
    let total: usize = shape.iter().product();
    let mut values = Vec::with_capacity(total);

    for _ in 0..total {
        let sample = rng.gen::<f32>() * 2.0 * limit - limit;
        values.push(sample);
    }

    Tensor::<B, D>::from_floats(TensorData::new(values, shape), device)
}

#[cfg(test)]
mod tests {
    use burn_candle::{Candle, CandleDevice};

    use super::*;

    type TestBackend = Candle<f32, i64>;

    #[test]
    fn forward_shapes_follow_the_config() {
        let device = CandleDevice::Cpu;
        let model: Autoencoder<TestBackend> = Autoencoder::init(&device, 18, 5, 1);

        let x = Tensor::<TestBackend, 2>::zeros([4, 18], &device);
        let (recon, latent) = model.forward(x);
        assert_eq!(recon.dims(), [4, 18]);
        assert_eq!(latent.dims(), [4, 5]);
    }

    #[test]
    fn init_is_deterministic_per_seed() {
        let device = CandleDevice::Cpu;
        let a: Autoencoder<TestBackend> = Autoencoder::init(&device, 6, 2, 7);
        let b: Autoencoder<TestBackend> = Autoencoder::init(&device, 6, 2, 7);

        let x = Tensor::<TestBackend, 2>::ones([1, 6], &device);
        let (recon_a, _) = a.forward(x.clone());
        let (recon_b, _) = b.forward(x);
        let diff = (recon_a - recon_b).abs().max().into_scalar();
        assert_eq!(diff, 0.0);
    }
}
