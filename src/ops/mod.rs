pub mod add_n;
pub mod array;
pub mod assign;
pub mod combine;
pub mod concat;
pub mod data;
pub mod embedding;
pub mod fill;
pub mod scale;
pub mod split;
pub mod view;

pub use add_n::AddN;
pub use array::{
    AddNArray, ArrayLength, ArrayRead, ArrayToTensor, ArrayWrite, CreateArray, CreateArrayLike,
    SliceArrayDense, TensorToArray,
};
pub use assign::Assign;
pub use combine::{BuiltinCombine, BuiltinSplit};
pub use concat::{AxisArg, Concat, ConcatGrad};
pub use data::{Data, Parameter, SetParameter};
pub use embedding::EmbeddingGrad;
pub use fill::{Full, FullLike};
pub use scale::Scale;
pub use split::SplitWithNum;
pub use view::{ViewDtype, ViewDtypeGrad, ViewShape, ViewShapeGrad};

use crate::{
    builder::{Builder, Value},
    context::Context,
    error::Result,
    identity::Id,
    kernels::{Attribute, DataLayout, KernelArgs, KernelFactory},
    tensor::DenseTensor,
};

pub trait OpClone {
    fn boxed_clone(&self) -> Box<dyn Op>;
}

impl<T> OpClone for T
where
    T: 'static + Op + Clone,
{
    fn boxed_clone(&self) -> Box<dyn Op> {
        Box::new(self.clone())
    }
}

pub trait Op: std::fmt::Debug + OpClone {
    fn name(&self) -> &str;
    /// forward semantics
    fn eval(&self, ctx: &mut Context) -> Result<()>;

    /// symbolic vector jacobian product
    /// given upstream output grads (`None` where nothing flows back)
    /// emits and returns gradients w.r.t inputs.
    fn vjp(&self, _b: &mut Builder<'_>, _out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        Ok(vec![None; self.inputs().len()])
    }

    /// returns the input(s) to the operation.
    fn inputs(&self) -> Vec<Id>;
    /// returns the output(s) to the operation.
    fn outputs(&self) -> Vec<Id>;
}

impl Clone for Box<dyn Op> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Looks up `name` for the context's device and runs it on tensor inputs.
pub fn run_kernel(
    ctx: &Context,
    name: &'static str,
    layout: DataLayout,
    inputs: &[Id],
    attrs: Vec<Attribute>,
) -> Result<DenseTensor> {
    let tensors = inputs
        .iter()
        .map(|id| ctx.tensor(id, name))
        .collect::<Result<Vec<_>>>()?;
    KernelFactory::global().run(ctx.device(), layout, KernelArgs::new(name, tensors, attrs))
}

pub mod macros {
    /// A single-output op whose forward pass is one registered kernel over
    /// tensor inputs.
    #[macro_export]
    macro_rules! kernel_op {
        (
            $name:ident,
            disp: $strname:expr,
            layout: $layout:expr,
            inputs: [$($input:ident),+],
            attrs: {$($attr:ident: $ty:ty => $conv:expr),* $(,)?},
            vjp: $vjp_rule:expr
        ) => {
            #[derive(Debug, Clone)]
            pub struct $name {
                $(pub $input: $crate::identity::Id,)+
                $(pub $attr: $ty,)*
                pub out: $crate::identity::Id,
            }

            impl $crate::ops::Op for $name {
                fn name(&self) -> &str {
                    $strname
                }

                fn eval(&self, ctx: &mut $crate::context::Context) -> $crate::error::Result<()> {
                    $(let $attr = &self.$attr;)*
                    let out = $crate::ops::run_kernel(
                        ctx,
                        $strname,
                        $layout,
                        &[$(self.$input),+],
                        vec![$($conv),*],
                    )?;
                    ctx.insert(self.out, out);
                    Ok(())
                }

                fn vjp(
                    &self,
                    b: &mut $crate::builder::Builder<'_>,
                    out_grads: &[Option<$crate::builder::Value>],
                ) -> $crate::error::Result<Vec<Option<$crate::builder::Value>>> {
                    match out_grads.first().copied().flatten() {
                        Some(og) => ($vjp_rule)(self, b, og),
                        None => Ok(vec![None; $crate::ops::Op::inputs(self).len()]),
                    }
                }

                fn inputs(&self) -> Vec<$crate::identity::Id> {
                    vec![$(self.$input),+]
                }

                fn outputs(&self) -> Vec<$crate::identity::Id> {
                    vec![self.out]
                }
            }
        };
    }
}
