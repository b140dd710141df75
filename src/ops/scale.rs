use crate::{
    builder::{Builder, Value},
    error::Result,
    kernel_op,
    kernels::{Attribute, DataLayout},
};

kernel_op!(
    Scale,
    disp: "scale",
    layout: DataLayout::AllLayout,
    inputs: [x],
    attrs: {
        scale: f64 => Attribute::Float(*scale),
        bias: f64 => Attribute::Float(*bias),
        bias_after_scale: bool => Attribute::Bool(*bias_after_scale),
    },
    vjp: |this: &Scale, b: &mut Builder<'_>, og: Value| -> Result<Vec<Option<Value>>> {
        Ok(vec![Some(b.scale(og, this.scale, 0.0, true)?)])
    }
);

impl Builder<'_> {
    /// `x * scale + bias`, or `(x + bias) * scale` when `bias_after_scale`
    /// is off.
    pub fn scale(&mut self, x: Value, scale: f64, bias: f64, bias_after_scale: bool) -> Result<Value> {
        let ty = self.tensor_type(x, "scale")?;
        let out = self.fresh(ty);
        self.emit(Scale {
            x: x.id(),
            scale,
            bias,
            bias_after_scale,
            out,
        });
        Ok(Value::new(out))
    }
}
